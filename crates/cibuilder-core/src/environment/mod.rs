//! CI-provider-normalized build environment.
//!
//! [`Environment`] is computed once at process start from environment
//! variables and the package manifest, and is read-only afterwards. A
//! manifest problem does not abort construction: it is kept in
//! [`Environment::error`] and surfaced when the builder starts running.

pub mod manifest;
pub mod teamcity;
pub mod travis;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

pub use manifest::{ManifestError, PackageInfo};

use crate::exception::Exception;

/// Generic variable set by most CI services.
pub const CI: &str = "CI";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const RELEASE_SETUP: &str = "RELEASE_SETUP";
pub const PRE_RELEASE: &str = "PRE_RELEASE";
/// Prefix of `"<token>#<channel>"` notification variables.
pub const SLACK_CHANNEL_PREFIX: &str = "SLACK_CHANNEL_";

/// Supported CI services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiKind {
    TeamCity,
    Travis,
    /// A CI service without a dedicated mapping.
    Other,
    /// Not running in CI.
    None,
}

impl CiKind {
    pub fn detect(vars: &dyn VarSource) -> Self {
        if vars.var(teamcity::TEAMCITY).is_some() {
            CiKind::TeamCity
        } else if vars.var(travis::TRAVIS).is_some() {
            CiKind::Travis
        } else if vars.var(CI).is_some() {
            CiKind::Other
        } else {
            CiKind::None
        }
    }

    pub fn is_ci(self) -> bool {
        self != CiKind::None
    }
}

impl fmt::Display for CiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CiKind::TeamCity => "TEAMCITY",
            CiKind::Travis => "TRAVIS",
            CiKind::Other => "OTHER",
            CiKind::None => "NONE",
        };
        f.write_str(name)
    }
}

/// Source of environment variables.
pub trait VarSource {
    fn var(&self, key: &str) -> Option<String>;

    /// All `(key, value)` pairs whose key starts with `prefix`, sorted by key.
    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut vars: Vec<_> = std::env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        vars.sort();
        vars
    }
}

impl VarSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl VarSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut vars: Vec<_> = self
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.sort();
        vars
    }
}

/// Build identifiers as reported by the CI service. Empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub project_name: String,
    pub config_name: String,
    /// Internal id of the build.
    pub build_id: String,
    /// Human facing build number, e.g. `"4"`.
    pub build_number: String,
    /// Branch a pull request originates from; empty for push builds.
    pub pull_request_branch: String,
    pub pull_request_number: String,
    /// Branch being built, or targeted by the pull request.
    pub target_branch: String,
    pub commit_message: String,
    pub commit: String,
}

impl BuildInfo {
    fn for_ci(ci: CiKind, vars: &dyn VarSource) -> Self {
        match ci {
            CiKind::TeamCity => teamcity::build_info(vars),
            CiKind::Travis => travis::build_info(vars),
            CiKind::Other | CiKind::None => BuildInfo::default(),
        }
    }

    pub fn is_pull_request(&self) -> bool {
        !self.pull_request_branch.is_empty()
    }
}

/// Immutable snapshot of everything the builder needs to know about its run.
#[derive(Debug, Clone)]
pub struct Environment {
    pub ci: CiKind,
    pub build: BuildInfo,
    pub github_token: String,
    /// `"<token>#<channel>"` entries, ordered by variable name.
    pub slack_channels: Vec<String>,
    pub is_release_setup: bool,
    pub is_pre_release: bool,
    pub package: PackageInfo,
    /// Failure captured while reading the manifest.
    pub error: Option<Exception>,
}

impl Environment {
    /// Read the process environment and `./package.json`.
    pub fn from_process() -> Self {
        Self::load(&ProcessEnv, PackageInfo::read(Path::new("./package.json")))
    }

    pub fn load(vars: &dyn VarSource, manifest: Result<PackageInfo, ManifestError>) -> Self {
        let ci = CiKind::detect(vars);
        let flag = |key: &str| vars.var(key).is_some_and(|v| !v.is_empty());

        let (package, error) = match manifest {
            Ok(package) => (package, None),
            Err(err) => (PackageInfo::default(), Some(Exception::from_error(&err))),
        };

        let env = Self {
            ci,
            build: BuildInfo::for_ci(ci, vars),
            github_token: vars.var(GITHUB_TOKEN).unwrap_or_default(),
            slack_channels: vars
                .vars_with_prefix(SLACK_CHANNEL_PREFIX)
                .into_iter()
                .map(|(_, v)| v)
                .filter(|v| !v.is_empty())
                .collect(),
            is_release_setup: flag(RELEASE_SETUP),
            is_pre_release: flag(PRE_RELEASE),
            package,
            error,
        };
        tracing::debug!(ci = %env.ci, target_branch = %env.build.target_branch, "environment loaded");
        env
    }

    pub fn is_ci(&self) -> bool {
        self.ci.is_ci()
    }
}
