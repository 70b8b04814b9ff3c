//! Services shared by the builder and its release policy.

use std::sync::Arc;

use crate::build_util::BuildUtil;
use crate::console::Console;
use crate::environment::Environment;
use crate::git::{Git, GitCli};
use crate::github::{GithubClient, RepositoryHost};
use crate::messages::LogFile;
use crate::prompt::{DialoguerPrompt, VersionPrompt};
use crate::registry::{Registry, YarnRegistry};

/// Version pair handed to the release-setup hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub current_version: String,
    pub new_version: String,
}

/// Dependency graph of one builder run, constructed once per process.
pub struct BuildContext {
    pub env: Environment,
    pub console: Arc<Console>,
    pub git: Arc<dyn Git>,
    pub registry: Arc<dyn Registry>,
    pub host: Arc<dyn RepositoryHost>,
    pub prompt: Arc<dyn VersionPrompt>,
    pub log_file: LogFile,
}

impl BuildContext {
    /// Wire the command-line and network backed services for `env`.
    pub fn from_environment(env: Environment, log_file: LogFile) -> Self {
        let console = Arc::new(Console::new(env.ci));
        let git = Arc::new(GitCli::new(console.clone()));
        let registry = Arc::new(YarnRegistry::new(console.clone(), env.package.clone()));
        let host = Arc::new(GithubClient::new(&env, console.clone()));
        Self {
            env,
            console,
            git,
            registry,
            host,
            prompt: Arc::new(DialoguerPrompt),
            log_file,
        }
    }

    pub fn build_util(&self) -> BuildUtil<'_> {
        BuildUtil::new(self)
    }
}
