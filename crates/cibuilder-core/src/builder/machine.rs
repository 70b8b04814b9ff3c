//! The builder state machine.
//!
//! ```text
//! run ── env error ──────────────▶ Err
//!     ├─ no CI ─▶ Non-CI ─┬─ PRE_RELEASE   ─▶ preRelease
//!     │                   ├─ RELEASE_SETUP ─▶ startRelease ─▶ releaseSetup
//!     │                   └─ otherwise     ─▶ test
//!     └─ CI ────▶ CI-Builder ─▶ test ─┬─ pull request ─▶ beforeVerifyPullRequest ─▶ verify(Non)Release ─▶ afterVerifyPullRequest*
//!                                     └─ branch push  ─▶ beforePublish ─▶ publish ─▶ afterPublish*   (release commits only)
//! ```
//!
//! Steps marked `*` are best-effort: their failures are reported as warnings.

use std::time::Instant;

use futures::future::BoxFuture;
use tracing::Instrument;

use super::context::{BuildContext, ReleaseInfo};
use super::policy::ReleasePolicy;
use super::step::StepKind;
use crate::exception::{Exception, StepResult};
use crate::obs;

/// Transient branch pre-releases are published from.
pub const PRE_RELEASE_BRANCH: &str = "__build";

/// Branch created by the release setup.
pub const RELEASE_BRANCH: &str = "release";

/// Per-invocation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderRunState {
    /// Name of the step being executed.
    pub current_step: String,
    /// Steps that failed, innermost first.
    pub failure_steps: Vec<String>,
}

impl Default for BuilderRunState {
    fn default() -> Self {
        Self {
            current_step: "init".to_string(),
            failure_steps: Vec::new(),
        }
    }
}

impl BuilderRunState {
    /// Failing steps joined as `"a -> b"`.
    pub fn failure_trace(&self) -> String {
        self.failure_steps.join(" -> ")
    }
}

/// Generic builder driving a [`ReleasePolicy`].
pub struct CiBuilder<P> {
    policy: P,
    ctx: BuildContext,
    state: BuilderRunState,
}

impl<P: ReleasePolicy> CiBuilder<P> {
    pub fn new(policy: P, ctx: BuildContext) -> Self {
        Self {
            policy,
            ctx,
            state: BuilderRunState::default(),
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn state(&self) -> &BuilderRunState {
        &self.state
    }

    /// Entry point. A manifest error captured by the environment is returned
    /// as-is before anything runs.
    pub async fn run(&mut self) -> StepResult {
        if let Some(err) = &self.ctx.env.error {
            return Err(err.clone());
        }
        if self.ctx.env.is_ci() {
            self.run_step(StepKind::CiBuilder, None).await
        } else {
            self.run_step(StepKind::NonCi, None).await
        }
    }

    async fn run_non_ci(&mut self) -> StepResult {
        if self.ctx.env.is_pre_release {
            self.run_step(StepKind::PreRelease, None).await
        } else if self.ctx.env.is_release_setup {
            self.run_step(StepKind::StartRelease, None).await
        } else {
            self.run_step(StepKind::Test, None).await
        }
    }

    async fn run_ci(&mut self) -> StepResult {
        self.run_step(StepKind::Test, None).await?;
        if self.ctx.env.build.is_pull_request() {
            self.handle_pull_request().await
        } else {
            self.handle_branch().await
        }
    }

    async fn handle_branch(&mut self) -> StepResult {
        let branch = self.ctx.env.build.target_branch.clone();
        let commit_message = self.ctx.env.build.commit_message.clone();
        self.ctx
            .console
            .log(format!("New changes on '{branch}' branch."));

        if !self.policy.is_release(&self.ctx, &branch, &commit_message).await {
            let quoted = serde_json::to_string(&commit_message)
                .unwrap_or_else(|_| format!("{commit_message:?}"));
            self.ctx.console.log(format!(
                "Skipping release on '{branch}' branch.\nLast commit message: {quoted}"
            ));
            return Ok(());
        }

        if let Err(err) = self.ctx.log_file.set_release_flag() {
            self.ctx.console.warn(&err);
        }

        self.run_sequence(&[StepKind::BeforePublish, StepKind::Publish])
            .await?;
        self.ctx
            .console
            .log(format!("Released version {}", self.ctx.env.package.version));

        self.run_best_effort(StepKind::AfterPublish).await;
        Ok(())
    }

    async fn handle_pull_request(&mut self) -> StepResult {
        self.ctx.console.log("Handling pull request");
        let is_release_pr = self
            .policy
            .is_release_pull_request(&self.ctx, &self.ctx.env.build.pull_request_branch)
            .await;
        let verification = if is_release_pr {
            StepKind::VerifyRelease
        } else {
            StepKind::VerifyNonRelease
        };

        self.run_sequence(&[StepKind::BeforeVerifyPullRequest, verification])
            .await?;

        self.run_best_effort(StepKind::AfterVerifyPullRequest).await;
        Ok(())
    }

    async fn create_pre_release(&mut self) -> StepResult {
        let git = self.ctx.git.clone();
        verify_committed(&git.modified_files().await?)?;
        let branch = git.current_branch().await?;
        git.switch_branch(PRE_RELEASE_BRANCH, true).await?;

        let result = self
            .run_sequence(&[StepKind::BeforePublish, StepKind::Publish])
            .await;
        match &result {
            Ok(()) => self.ctx.console.log("Pre-release successful"),
            Err(err) => self.ctx.console.error(err, false),
        }

        if let Err(err) = git.switch_and_delete(&branch, PRE_RELEASE_BRANCH).await {
            self.ctx.console.warn(&err);
        }

        result
    }

    async fn run_release_setup(&mut self) -> StepResult {
        let git = self.ctx.git.clone();
        let current_branch = git.current_branch().await?;
        require_branch(&current_branch, self.policy.main_branch())?;
        verify_committed(&git.modified_files().await?)?;

        let current_version = self.ctx.env.package.version.clone();
        let new_version = self.ctx.prompt.next_version(&current_version).await?;
        git.switch_branch(RELEASE_BRANCH, true).await?;

        let info = ReleaseInfo {
            current_version,
            new_version: new_version.clone(),
        };
        self.run_step(StepKind::ReleaseSetup, Some(info)).await?;
        self.ctx
            .console
            .log(format!("setup for version {new_version} complete"));
        Ok(())
    }

    /// Execute one step inside a log block, recording it in the failure
    /// trace when it fails.
    pub async fn run_step(&mut self, kind: StepKind, input: Option<ReleaseInfo>) -> StepResult {
        let step = kind.step();
        self.ctx.console.open_block(step.name, step.description);
        self.state.current_step = step.name.to_string();
        obs::emit_step_started(step.name);
        let started = Instant::now();

        let result = self
            .dispatch(kind, input)
            .instrument(obs::step_span(step.name))
            .await;

        self.state.current_step = step.name.to_string();
        self.ctx.console.close_block(step.name);
        obs::emit_step_finished(step.name, started.elapsed().as_millis() as u64, result.is_ok());
        if result.is_err() {
            self.state.failure_steps.push(step.name.to_string());
        }
        result
    }

    /// Run `steps` in order, stopping at the first failure.
    async fn run_sequence(&mut self, steps: &[StepKind]) -> StepResult {
        for kind in steps {
            self.run_step(*kind, None).await?;
        }
        Ok(())
    }

    /// Run a step whose failure only warrants a warning.
    async fn run_best_effort(&mut self, kind: StepKind) {
        if let Err(err) = self.run_step(kind, None).await {
            obs::emit_step_downgraded(kind.name(), &err);
            self.ctx.console.warn(&err);
        }
    }

    /// Handler bound to each step kind. Boxed so steps can nest.
    fn dispatch(&mut self, kind: StepKind, input: Option<ReleaseInfo>) -> BoxFuture<'_, StepResult> {
        Box::pin(async move {
            match kind {
                StepKind::CiBuilder => self.run_ci().await,
                StepKind::NonCi => self.run_non_ci().await,
                StepKind::PreRelease => self.create_pre_release().await,
                StepKind::StartRelease => self.run_release_setup().await,
                StepKind::Test => self.policy.test(&self.ctx).await,
                StepKind::ReleaseSetup => match input {
                    Some(info) => self.policy.release_setup(&self.ctx, &info).await,
                    None => Err(Exception::new("releaseSetup requires the release versions")),
                },
                StepKind::BeforeVerifyPullRequest => {
                    self.policy.before_verify_pull_request(&self.ctx).await
                }
                StepKind::VerifyRelease => self.policy.verify_release(&self.ctx).await,
                StepKind::VerifyNonRelease => self.policy.verify_non_release(&self.ctx).await,
                StepKind::AfterVerifyPullRequest => {
                    self.policy.after_verify_pull_request(&self.ctx).await
                }
                StepKind::BeforePublish => self.policy.before_publish(&self.ctx).await,
                StepKind::Publish => self.policy.publish(&self.ctx).await,
                StepKind::AfterPublish => self.policy.after_publish(&self.ctx).await,
            }
        })
    }
}

/// Fail when the working tree has uncommitted changes.
pub fn verify_committed(files: &[String]) -> StepResult {
    if files.is_empty() {
        return Ok(());
    }
    Err(Exception::new(format!(
        "Commit the following files:\n  {}",
        files.join("\n  ")
    )))
}

/// Fail unless `current` is `required`.
pub fn require_branch(current: &str, required: &str) -> StepResult {
    if current == required {
        return Ok(());
    }
    Err(Exception::new(format!(
        "'{current}' is not the required branch '{required}'"
    )))
}
