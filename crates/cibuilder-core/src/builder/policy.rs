//! Hooks a concrete project supplies to the builder.

use async_trait::async_trait;

use super::context::{BuildContext, ReleaseInfo};
use crate::exception::StepResult;

/// Release policy of a project: when to release and how each step runs.
///
/// The builder decides the order in which hooks run and how their failures
/// propagate; implementations only do the work of each step.
#[async_trait]
pub trait ReleasePolicy: Send + Sync {
    /// Branch releases are cut from.
    fn main_branch(&self) -> &str {
        "master"
    }

    /// Whether a push of `commit_message` to `branch` should be released.
    async fn is_release(&self, ctx: &BuildContext, branch: &str, commit_message: &str) -> bool;

    /// Whether a pull request from `branch` proposes a release.
    async fn is_release_pull_request(&self, ctx: &BuildContext, branch: &str) -> bool;

    async fn test(&self, ctx: &BuildContext) -> StepResult;

    async fn before_verify_pull_request(&self, _ctx: &BuildContext) -> StepResult {
        Ok(())
    }

    async fn verify_release(&self, ctx: &BuildContext) -> StepResult;

    async fn verify_non_release(&self, ctx: &BuildContext) -> StepResult;

    async fn after_verify_pull_request(&self, _ctx: &BuildContext) -> StepResult {
        Ok(())
    }

    async fn before_publish(&self, ctx: &BuildContext) -> StepResult;

    async fn publish(&self, ctx: &BuildContext) -> StepResult;

    /// Runs after a successful release only. Failures are reported as warnings.
    async fn after_publish(&self, ctx: &BuildContext) -> StepResult;

    /// Apply the version bump to tracked files.
    async fn release_setup(&self, ctx: &BuildContext, info: &ReleaseInfo) -> StepResult;
}
