//! Release policy for npm packages published with yarn.
//!
//! A push to the main branch is released when it is the merge of a pull
//! request from a `release` branch. Pull requests from `release` must bump
//! the version; any other pull request must leave it alone.

use std::path::PathBuf;

use async_trait::async_trait;
use colored::Colorize;
use regex::Regex;

use crate::build_util::change_package_version;
use crate::builder::{BuildContext, ReleaseInfo, ReleasePolicy, RELEASE_BRANCH};
use crate::exception::{Exception, Result, StepResult};
use crate::process::CommandLine;
use crate::version::Semver;

const RELEASE_MERGE_PATTERN: &str = r"^Merge pull request #(\d+) from (.*)/release(.*)";

/// Version and dist-tag a publish uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInfo {
    pub version: String,
    pub tag: String,
}

/// Commands and paths used by [`NpmPolicy`].
#[derive(Debug, Clone)]
pub struct NpmPolicyConfig {
    pub main_branch: String,
    pub test_command: String,
    /// Run before publishing, e.g. to stage build output. Skipped when empty.
    pub before_publish_command: String,
    pub package_path: PathBuf,
    pub changelog_path: PathBuf,
    pub readme_path: PathBuf,
    pub release_name_prefix: String,
}

impl Default for NpmPolicyConfig {
    fn default() -> Self {
        Self {
            main_branch: "master".to_string(),
            test_command: "yarn test".to_string(),
            before_publish_command: String::new(),
            package_path: PathBuf::from("./package.json"),
            changelog_path: PathBuf::from("./CHANGELOG.md"),
            readme_path: PathBuf::from("./README.md"),
            release_name_prefix: "Version ".to_string(),
        }
    }
}

pub struct NpmPolicy {
    config: NpmPolicyConfig,
}

impl NpmPolicy {
    pub fn new(config: NpmPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NpmPolicyConfig {
        &self.config
    }

    /// Pre-releases publish `<major>.0.0-SNAPSHOT.<commit>` under `snapshot`;
    /// everything else publishes the manifest version under `latest`.
    pub async fn publish_info(&self, ctx: &BuildContext) -> Result<PublishInfo> {
        let version = &ctx.env.package.version;
        if !ctx.env.is_pre_release {
            return Ok(PublishInfo {
                version: version.clone(),
                tag: "latest".to_string(),
            });
        }
        let major = Semver::parse(version)
            .map(|v| v.major)
            .ok_or_else(|| Exception::new(format!("Unable to parse version: {version}")))?;
        let commit = ctx.git.current_commit().await?;
        Ok(PublishInfo {
            version: format!("{major}.0.0-SNAPSHOT.{commit}"),
            tag: "snapshot".to_string(),
        })
    }

    async fn run_command(&self, command: &str) -> StepResult {
        match CommandLine::parse(command) {
            Some(cmd) => {
                cmd.inherit_output().run().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn changelog_name(&self) -> String {
        self.config
            .changelog_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "CHANGELOG.md".to_string())
    }
}

#[async_trait]
impl ReleasePolicy for NpmPolicy {
    fn main_branch(&self) -> &str {
        &self.config.main_branch
    }

    async fn is_release(&self, _ctx: &BuildContext, branch: &str, commit_message: &str) -> bool {
        let main = self.main_branch();
        let on_main = branch == main || branch.strip_prefix("refs/heads/") == Some(main);
        on_main
            && Regex::new(RELEASE_MERGE_PATTERN)
                .map(|re| re.is_match(commit_message))
                .unwrap_or(false)
    }

    async fn is_release_pull_request(&self, _ctx: &BuildContext, branch: &str) -> bool {
        branch == RELEASE_BRANCH
    }

    async fn test(&self, ctx: &BuildContext) -> StepResult {
        self.run_command(&self.config.test_command)
            .await
            .map_err(|e| e.context("tests failed"))?;
        ctx.console.log("Testing passed");
        Ok(())
    }

    async fn verify_release(&self, ctx: &BuildContext) -> StepResult {
        ctx.build_util().verify_new_package_version().await
    }

    async fn verify_non_release(&self, ctx: &BuildContext) -> StepResult {
        ctx.build_util().verify_untouched_package_version().await
    }

    async fn before_publish(&self, _ctx: &BuildContext) -> StepResult {
        self.run_command(&self.config.before_publish_command).await
    }

    async fn publish(&self, ctx: &BuildContext) -> StepResult {
        let info = self.publish_info(ctx).await?;
        ctx.registry.publish(&info.version, &info.tag).await?;
        let name = &ctx.env.package.name;
        ctx.console.log(format!(
            "\nRun:\n{}\n  to install {name}@{}\n",
            format!("  yarn add {name}@{} -E -D", info.tag).green(),
            info.version.blue()
        ));
        Ok(())
    }

    async fn after_publish(&self, ctx: &BuildContext) -> StepResult {
        ctx.host
            .create_release(&self.changelog_name(), &self.config.release_name_prefix)
            .await
    }

    async fn release_setup(&self, ctx: &BuildContext, info: &ReleaseInfo) -> StepResult {
        change_package_version(&info.new_version, &self.config.package_path)?;
        let util = ctx.build_util();
        util.update_changelog(&info.new_version, &self.config.changelog_path)
            .await?;
        util.replace_versions_in_readme(
            &info.current_version,
            &info.new_version,
            &self.config.readme_path,
        )
    }
}
