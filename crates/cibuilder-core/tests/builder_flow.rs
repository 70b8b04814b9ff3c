//! End-to-end runs of the builder state machine against in-memory services.
//!
//! Every hook of `ScriptedPolicy` records its name into a shared journal, so
//! the tests can assert exactly which steps ran and in which order.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use cibuilder_core::builder::{BuildContext, CiBuilder, ReleaseInfo, ReleasePolicy};
use cibuilder_core::fakes::{context_for, package_env, Journal, MemoryGit, MemorySink, ScriptedPrompt};
use cibuilder_core::{run_builder, CiKind, Environment, Exception, StepResult};

const RELEASE_MERGE: &str = "Merge pull request #12 from acme/release 1.1.0";

#[derive(Default)]
struct ScriptedPolicy {
    journal: Journal,
    failing: HashSet<&'static str>,
    release: bool,
    release_pull_request: bool,
}

impl ScriptedPolicy {
    fn releasing() -> Self {
        Self {
            release: true,
            ..Default::default()
        }
    }

    fn failing(mut self, hook: &'static str) -> Self {
        self.failing.insert(hook);
        self
    }

    fn hook(&self, ctx: &BuildContext, name: &'static str) -> StepResult {
        self.journal.record(name);
        ctx.console.log(name);
        if self.failing.contains(name) {
            return Err(Exception::new(format!("{name} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReleasePolicy for ScriptedPolicy {
    async fn is_release(&self, _ctx: &BuildContext, _branch: &str, _msg: &str) -> bool {
        self.release
    }

    async fn is_release_pull_request(&self, _ctx: &BuildContext, _branch: &str) -> bool {
        self.release_pull_request
    }

    async fn test(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "test")
    }

    async fn before_verify_pull_request(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "beforeVerifyPullRequest")
    }

    async fn verify_release(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "verifyRelease")
    }

    async fn verify_non_release(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "verifyNonRelease")
    }

    async fn after_verify_pull_request(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "afterVerifyPullRequest")
    }

    async fn before_publish(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "beforePublish")
    }

    async fn publish(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "publish")
    }

    async fn after_publish(&self, ctx: &BuildContext) -> StepResult {
        self.hook(ctx, "afterPublish")
    }

    async fn release_setup(&self, ctx: &BuildContext, info: &ReleaseInfo) -> StepResult {
        self.journal
            .record(format!("releaseSetup({} -> {})", info.current_version, info.new_version));
        ctx.console.log("releaseSetup");
        Ok(())
    }
}

fn branch_env(ci: CiKind, branch: &str, commit_message: &str) -> Environment {
    let mut env = package_env(ci, "1.1.0");
    env.build.target_branch = branch.to_string();
    env.build.commit_message = commit_message.to_string();
    env
}

fn pull_request_env(pr_branch: &str) -> Environment {
    let mut env = package_env(CiKind::Travis, "1.1.0");
    env.build.target_branch = "master".to_string();
    env.build.pull_request_branch = pr_branch.to_string();
    env.build.pull_request_number = "12".to_string();
    env
}

fn builder(
    policy: ScriptedPolicy,
    env: Environment,
) -> (CiBuilder<ScriptedPolicy>, Journal, Arc<MemorySink>) {
    let journal = policy.journal.clone();
    let (ctx, sink) = context_for(env);
    (CiBuilder::new(policy, ctx), journal, sink)
}

// ---------------------------------------------------------------------------
// Branch handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_release_commit_is_skipped() {
    let env = branch_env(CiKind::TeamCity, "master", "Merge pull request #12 from acme/feature");
    let (mut builder, journal, sink) = builder(ScriptedPolicy::default(), env);

    builder.run().await.unwrap();

    assert_eq!(journal.entries(), vec!["test"]);
    assert!(sink.contains("New changes on 'master' branch."));
    assert!(sink.contains(
        "Skipping release on 'master' branch.\nLast commit message: \"Merge pull request #12 from acme/feature\""
    ));
    assert!(builder.state().failure_steps.is_empty());
}

#[tokio::test]
async fn release_commit_publishes_and_flags_log_file() {
    let env = branch_env(CiKind::Travis, "master", RELEASE_MERGE);
    let (mut builder, journal, sink) = builder(ScriptedPolicy::releasing(), env);

    let code = run_builder(&mut builder, true).await;

    assert_eq!(code, 0);
    assert_eq!(
        journal.entries(),
        vec!["test", "beforePublish", "publish", "afterPublish"]
    );
    assert!(sink.contains("Released version 1.1.0"));
    assert!(sink.contains("Process is done."));
    assert!(sink.contains("travis_fold:start:publish"));
    assert!(sink.contains("travis_fold:end:publish"));
    assert!(builder.context().log_file.load().unwrap().is_release());
}

#[tokio::test]
async fn before_publish_failure_stops_the_release() {
    let env = branch_env(CiKind::TeamCity, "master", RELEASE_MERGE);
    let (mut builder, journal, _) = builder(ScriptedPolicy::releasing().failing("beforePublish"), env);

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "beforePublish failed");
    assert_eq!(journal.entries(), vec!["test", "beforePublish"]);
    assert_eq!(builder.state().failure_trace(), "beforePublish -> CI-Builder");
}

#[tokio::test]
async fn publish_failure_is_reported_with_step_trace() {
    let env = branch_env(CiKind::Travis, "master", RELEASE_MERGE);
    let (mut builder, journal, sink) = builder(ScriptedPolicy::releasing().failing("publish"), env);

    let code = run_builder(&mut builder, true).await;

    assert_eq!(code, 1);
    assert_eq!(journal.entries(), vec!["test", "beforePublish", "publish"]);
    assert!(sink.contains("##buildFailure: Failures in `publish -> CI-Builder`: publish failed"));

    let stored = builder.context().log_file.load().unwrap();
    assert!(stored.is_release());
    assert_eq!(stored.errors.len(), 1);
    assert_eq!(stored.errors[0].0, "Failures in `publish -> CI-Builder`: publish failed");
}

#[tokio::test]
async fn after_publish_failure_is_only_a_warning() {
    let env = branch_env(CiKind::TeamCity, "master", RELEASE_MERGE);
    let (mut builder, journal, sink) = builder(ScriptedPolicy::releasing().failing("afterPublish"), env);

    let code = run_builder(&mut builder, false).await;

    assert_eq!(code, 0);
    assert_eq!(
        journal.entries(),
        vec!["test", "beforePublish", "publish", "afterPublish"]
    );
    assert!(sink.contains("##teamcity[message text='afterPublish failed' status='WARNING']"));
    assert_eq!(builder.state().failure_steps, vec!["afterPublish"]);
}

#[tokio::test]
async fn test_failure_aborts_ci_run() {
    let env = branch_env(CiKind::Travis, "master", RELEASE_MERGE);
    let (mut builder, journal, sink) = builder(ScriptedPolicy::releasing().failing("test"), env);

    let code = run_builder(&mut builder, false).await;

    assert_eq!(code, 1);
    assert_eq!(journal.entries(), vec!["test"]);
    assert_eq!(builder.state().failure_trace(), "test -> CI-Builder");
    assert!(sink.contains("##buildFailure: Failures in `test -> CI-Builder`: test failed"));
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_release_pull_request_is_verified() {
    let (mut builder, journal, sink) = builder(ScriptedPolicy::default(), pull_request_env("feature"));

    builder.run().await.unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "test",
            "beforeVerifyPullRequest",
            "verifyNonRelease",
            "afterVerifyPullRequest"
        ]
    );
    assert!(sink.contains("Handling pull request"));
}

#[tokio::test]
async fn release_pull_request_runs_release_verification() {
    let policy = ScriptedPolicy {
        release_pull_request: true,
        ..Default::default()
    };
    let (mut builder, journal, _) = builder(policy, pull_request_env("release"));

    builder.run().await.unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "test",
            "beforeVerifyPullRequest",
            "verifyRelease",
            "afterVerifyPullRequest"
        ]
    );
}

#[tokio::test]
async fn failed_verification_skips_after_hook() {
    let policy = ScriptedPolicy::default().failing("verifyNonRelease");
    let (mut builder, journal, _) = builder(policy, pull_request_env("feature"));

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "verifyNonRelease failed");
    assert_eq!(
        journal.entries(),
        vec!["test", "beforeVerifyPullRequest", "verifyNonRelease"]
    );
    assert_eq!(builder.state().failure_trace(), "verifyNonRelease -> CI-Builder");
}

#[tokio::test]
async fn after_verify_failure_keeps_pull_request_green() {
    let policy = ScriptedPolicy::default().failing("afterVerifyPullRequest");
    let (mut builder, _, sink) = builder(policy, pull_request_env("feature"));

    assert!(builder.run().await.is_ok());
    assert!(sink.contains("##buildWarning: afterVerifyPullRequest failed"));
}

// ---------------------------------------------------------------------------
// Non-CI flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_run_only_tests() {
    let (mut builder, journal, sink) = builder(ScriptedPolicy::default(), package_env(CiKind::None, "1.0.0"));

    let code = run_builder(&mut builder, false).await;

    assert_eq!(code, 0);
    assert_eq!(journal.entries(), vec!["test"]);
    assert!(sink.contains("[local] Non-CI: running in a non CI environment"));
    assert!(sink.contains("  [Non-CI] test: running tests"));
    assert!(sink.contains("    [test] test"));
}

fn pre_release_builder(
    policy: ScriptedPolicy,
    git: MemoryGit,
) -> (CiBuilder<ScriptedPolicy>, Journal, Arc<MemorySink>) {
    let mut env = package_env(CiKind::None, "1.0.0");
    env.is_pre_release = true;
    let journal = policy.journal.clone();
    let (mut ctx, sink) = context_for(env);
    ctx.git = Arc::new(git.with_journal(journal.clone()));
    (CiBuilder::new(policy, ctx), journal, sink)
}

#[tokio::test]
async fn pre_release_cleans_up_after_success() {
    let (mut builder, journal, sink) =
        pre_release_builder(ScriptedPolicy::default(), MemoryGit::new("feature"));

    builder.run().await.unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "git.modified_files",
            "git.current_branch",
            "git.switch_branch(__build, true)",
            "beforePublish",
            "publish",
            "git.discard_changes",
            "git.switch_branch(feature, false)",
            "git.delete_branch(__build)",
        ]
    );
    assert!(sink.lines().iter().any(|l| l.ends_with("Pre-release successful")));
}

#[tokio::test]
async fn pre_release_cleans_up_after_failure() {
    let policy = ScriptedPolicy::default().failing("publish");
    let (mut builder, journal, _) = pre_release_builder(policy, MemoryGit::new("feature"));

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "publish failed");
    let entries = journal.entries();
    assert_eq!(
        &entries[entries.len() - 3..],
        &[
            "git.discard_changes",
            "git.switch_branch(feature, false)",
            "git.delete_branch(__build)",
        ]
    );
    assert!(!entries.contains(&"afterPublish".to_string()));
    assert_eq!(builder.state().failure_trace(), "publish -> preRelease -> Non-CI");
}

#[tokio::test]
async fn pre_release_cleanup_failure_does_not_mask_success() {
    let git = MemoryGit::new("feature").failing("delete_branch");
    let (mut builder, _, sink) = pre_release_builder(ScriptedPolicy::default(), git);

    assert!(builder.run().await.is_ok());
    assert!(sink
        .lines()
        .iter()
        .any(|l| l.ends_with("WARNING: Git.delete_branch failure")));
}

#[tokio::test]
async fn pre_release_requires_clean_tree() {
    let git = MemoryGit::new("feature").with_modified_files(&["M file1", "N file 2"]);
    let (mut builder, journal, _) = pre_release_builder(ScriptedPolicy::default(), git);

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "Commit the following files:\n  M file1\n  N file 2");
    assert_eq!(journal.entries(), vec!["git.modified_files"]);
}

#[tokio::test]
async fn pre_release_stops_when_branch_switch_fails() {
    let git = MemoryGit::new("feature").failing("switch_branch");
    let (mut builder, journal, _) = pre_release_builder(ScriptedPolicy::default(), git);

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "Git.switch_branch failure");
    assert_eq!(journal.entries().last().unwrap(), "git.switch_branch(__build, true)");
    assert!(!journal.entries().contains(&"beforePublish".to_string()));
}

fn release_setup_builder(
    git: MemoryGit,
) -> (CiBuilder<ScriptedPolicy>, Journal, Arc<ScriptedPrompt>) {
    let mut env = package_env(CiKind::None, "1.0.0");
    env.is_release_setup = true;
    let policy = ScriptedPolicy::default();
    let journal = policy.journal.clone();
    let (mut ctx, _) = context_for(env);
    let prompt = Arc::new(ScriptedPrompt::new("1.1.0"));
    ctx.git = Arc::new(git.with_journal(journal.clone()));
    ctx.prompt = prompt.clone();
    (CiBuilder::new(policy, ctx), journal, prompt)
}

#[tokio::test]
async fn release_setup_switches_branch_and_runs_hook() {
    let (mut builder, journal, prompt) = release_setup_builder(MemoryGit::new("master"));

    builder.run().await.unwrap();

    assert_eq!(prompt.asked(), vec!["1.0.0"]);
    assert_eq!(
        journal.entries(),
        vec![
            "git.current_branch",
            "git.modified_files",
            "git.switch_branch(release, true)",
            "releaseSetup(1.0.0 -> 1.1.0)",
        ]
    );
}

#[tokio::test]
async fn release_setup_refuses_to_leave_other_branches() {
    let (mut builder, journal, prompt) = release_setup_builder(MemoryGit::new("feature"));

    let err = builder.run().await.unwrap_err();

    assert_eq!(err.message, "'feature' is not the required branch 'master'");
    assert!(prompt.asked().is_empty());
    assert_eq!(journal.entries(), vec!["git.current_branch"]);
    assert_eq!(builder.state().failure_trace(), "startRelease -> Non-CI");
}

// ---------------------------------------------------------------------------
// Environment errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manifest_error_short_circuits_every_ci_kind() {
    for ci in [CiKind::None, CiKind::Travis, CiKind::TeamCity] {
        let mut env = branch_env(ci, "master", RELEASE_MERGE);
        env.error = Some(Exception::new("missing field `version` in package.json"));
        let (mut builder, journal, _) = builder(ScriptedPolicy::releasing(), env);

        let err = builder.run().await.unwrap_err();

        assert_eq!(err.message, "missing field `version` in package.json");
        assert!(err.cause.is_none());
        assert!(journal.entries().is_empty());
        assert!(builder.state().failure_steps.is_empty());
    }
}
