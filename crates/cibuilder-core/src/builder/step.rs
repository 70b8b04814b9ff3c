//! Catalog of build lifecycle steps.

use std::fmt;

/// Every step the builder can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    CiBuilder,
    NonCi,
    Test,
    PreRelease,
    StartRelease,
    ReleaseSetup,
    BeforeVerifyPullRequest,
    VerifyRelease,
    VerifyNonRelease,
    AfterVerifyPullRequest,
    BeforePublish,
    Publish,
    AfterPublish,
}

/// Name and description of a step, used for log blocks and failure traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStep {
    pub kind: StepKind,
    pub name: &'static str,
    pub description: &'static str,
}

const fn step(kind: StepKind, name: &'static str, description: &'static str) -> BuildStep {
    BuildStep {
        kind,
        name,
        description,
    }
}

/// Indexed by `StepKind as usize`.
static STEPS: [BuildStep; 13] = [
    step(StepKind::CiBuilder, "CI-Builder", "running ci-builder"),
    step(StepKind::NonCi, "Non-CI", "running in a non CI environment"),
    step(StepKind::Test, "test", "running tests"),
    step(StepKind::PreRelease, "preRelease", "running pre-release"),
    step(StepKind::StartRelease, "startRelease", "starting the release-setup"),
    step(StepKind::ReleaseSetup, "releaseSetup", "running release-setup hook"),
    step(
        StepKind::BeforeVerifyPullRequest,
        "beforeVerifyPullRequest",
        "running beforeVerifyPullRequest",
    ),
    step(StepKind::VerifyRelease, "verifyRelease", "verifying release"),
    step(StepKind::VerifyNonRelease, "verifyNonRelease", "verifying non-release"),
    step(
        StepKind::AfterVerifyPullRequest,
        "afterVerifyPullRequest",
        "running afterVerifyPullRequest",
    ),
    step(StepKind::BeforePublish, "beforePublish", "running before publish"),
    step(StepKind::Publish, "publish", ""),
    step(StepKind::AfterPublish, "afterPublish", "running after publish"),
];

impl StepKind {
    pub const ALL: [StepKind; 13] = [
        StepKind::CiBuilder,
        StepKind::NonCi,
        StepKind::Test,
        StepKind::PreRelease,
        StepKind::StartRelease,
        StepKind::ReleaseSetup,
        StepKind::BeforeVerifyPullRequest,
        StepKind::VerifyRelease,
        StepKind::VerifyNonRelease,
        StepKind::AfterVerifyPullRequest,
        StepKind::BeforePublish,
        StepKind::Publish,
        StepKind::AfterPublish,
    ];

    pub fn step(self) -> &'static BuildStep {
        &STEPS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.step().name
    }

    pub fn description(self) -> &'static str {
        self.step().description
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
