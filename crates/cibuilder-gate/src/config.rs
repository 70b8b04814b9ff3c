//! Gate configuration.
//!
//! Values are layered: built-in defaults, then the `ciBuilder` section of the
//! project's tsconfig file, then `-D<name>=<value>` definitions from the
//! command line.
//!
//! ```json
//! {
//!   "compilerOptions": { "strict": true },
//!   "ciBuilder": {
//!     "allowed": { "TS6133": 4, "max-len": 10 },
//!     "ciLimit": 20
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::GateError;
use crate::status::AllowanceMap;

pub const DEFAULT_TSCONFIG_PATH: &str = "./tsconfig.json";
pub const DEFAULT_ESLINT_PATH: &str = "./.eslintrc.json";
pub const DEFAULT_CI_LIMIT: usize = 10;
pub const DEFAULT_CI_FILES_PER_MESSAGE: usize = 5;

/// Names accepted by `-D<name>=<value>`.
pub const DEFINITION_NAMES: [&str; 4] = ["tsconfigPath", "eslintPath", "ciLimit", "ciFilesPerMessage"];

/// Values given on the command line with `-D<name>=<value>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub tsconfig_path: Option<String>,
    pub eslint_path: Option<String>,
    pub ci_limit: Option<usize>,
    pub ci_files_per_message: Option<usize>,
}

impl Definitions {
    /// Parse `name=value` items. Later items override earlier ones.
    pub fn parse<I, S>(items: I) -> Result<Self, GateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut defs = Self::default();
        for item in items {
            let item = item.as_ref();
            let (name, value) = item.split_once('=').unwrap_or((item, ""));
            defs.set(name, value)?;
        }
        Ok(defs)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), GateError> {
        let number = || {
            value.parse::<usize>().map_err(|_| GateError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            })
        };
        match name {
            "tsconfigPath" => self.tsconfig_path = Some(value.to_string()),
            "eslintPath" => self.eslint_path = Some(value.to_string()),
            "ciLimit" => self.ci_limit = Some(number()?),
            "ciFilesPerMessage" => self.ci_files_per_message = Some(number()?),
            _ => return Err(GateError::InvalidDefinition(name.to_string())),
        }
        Ok(())
    }
}

/// Boolean command-line switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateFlags {
    pub ci: bool,
    pub no_lint: bool,
    pub no_msg_dump: bool,
    pub verbose: bool,
}

/// The `ciBuilder` section of the tsconfig file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CiBuilderSection {
    #[serde(default)]
    pub allowed: AllowanceMap,
    pub ci_limit: Option<usize>,
    pub ci_files_per_message: Option<usize>,
    pub eslint_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TsConfigFile {
    #[serde(default, rename = "ciBuilder")]
    ci_builder: CiBuilderSection,
}

impl CiBuilderSection {
    /// Read the section from the tsconfig file at `path`. A file without the
    /// section yields the defaults.
    pub fn read(path: &Path) -> Result<Self, GateError> {
        let text = std::fs::read_to_string(path).map_err(|source| GateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: TsConfigFile = serde_json::from_str(&text).map_err(|source| GateError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.ci_builder)
    }
}

/// Fully resolved gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Directory the tools run in; relative paths resolve against it.
    pub project_dir: PathBuf,
    pub tsconfig_path: String,
    /// `None` disables linting.
    pub eslint_path: Option<String>,
    pub allowed: AllowanceMap,
    pub ci: bool,
    pub ci_limit: usize,
    pub ci_files_per_message: usize,
    pub dump_messages: bool,
    pub verbose: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            tsconfig_path: DEFAULT_TSCONFIG_PATH.to_string(),
            eslint_path: Some(DEFAULT_ESLINT_PATH.to_string()),
            allowed: AllowanceMap::new(),
            ci: false,
            ci_limit: DEFAULT_CI_LIMIT,
            ci_files_per_message: DEFAULT_CI_FILES_PER_MESSAGE,
            dump_messages: true,
            verbose: false,
        }
    }
}

impl GateConfig {
    /// Resolve the configuration of the project in `project_dir`.
    pub fn load(project_dir: impl Into<PathBuf>, flags: GateFlags, defs: &Definitions) -> Result<Self, GateError> {
        let project_dir = project_dir.into();
        let tsconfig_path = defs
            .tsconfig_path
            .clone()
            .unwrap_or_else(|| DEFAULT_TSCONFIG_PATH.to_string());
        let section = CiBuilderSection::read(&project_dir.join(&tsconfig_path))?;

        let eslint_path = if flags.no_lint {
            None
        } else {
            defs.eslint_path
                .clone()
                .or(section.eslint_path)
                .or_else(|| Some(DEFAULT_ESLINT_PATH.to_string()))
                .filter(|p| !p.is_empty())
        };

        let config = Self {
            project_dir,
            tsconfig_path,
            eslint_path,
            allowed: section.allowed,
            ci: flags.ci,
            ci_limit: defs.ci_limit.or(section.ci_limit).unwrap_or(DEFAULT_CI_LIMIT),
            ci_files_per_message: defs
                .ci_files_per_message
                .or(section.ci_files_per_message)
                .unwrap_or(DEFAULT_CI_FILES_PER_MESSAGE),
            dump_messages: !flags.no_msg_dump,
            verbose: flags.verbose,
        };
        tracing::debug!(
            tsconfig = %config.tsconfig_path,
            allowed = config.allowed.len(),
            lint = config.eslint_path.is_some(),
            "gate configuration resolved"
        );
        Ok(config)
    }

    pub fn tsconfig_file(&self) -> PathBuf {
        self.project_dir.join(&self.tsconfig_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(tsconfig: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tsconfig.json"), tsconfig).unwrap();
        dir
    }

    #[test]
    fn test_definitions() {
        let defs = Definitions::parse(["ciLimit=5", "eslintPath=", "tsconfigPath=cfg/ts.json"]).unwrap();
        assert_eq!(defs.ci_limit, Some(5));
        assert_eq!(defs.eslint_path.as_deref(), Some(""));
        assert_eq!(defs.tsconfig_path.as_deref(), Some("cfg/ts.json"));

        let err = Definitions::parse(["outDir=x"]).unwrap_err();
        assert_eq!(err.to_string(), "outDir is not a valid -D argument");
        let err = Definitions::parse(["ciLimit=many"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid value 'many' for -DciLimit");
    }

    #[test]
    fn test_defaults_without_section() {
        let dir = project(r#"{"compilerOptions": {}}"#);
        let config = GateConfig::load(dir.path(), GateFlags::default(), &Definitions::default()).unwrap();
        assert!(config.allowed.is_empty());
        assert_eq!(config.eslint_path.as_deref(), Some(DEFAULT_ESLINT_PATH));
        assert_eq!(config.ci_limit, 10);
        assert_eq!(config.ci_files_per_message, 5);
        assert!(config.dump_messages);
    }

    #[test]
    fn test_layering() {
        let dir = project(
            r#"{"ciBuilder": {"allowed": {"TS6133": 4}, "ciLimit": 20, "ciFilesPerMessage": 2, "eslintPath": "lint.json"}}"#,
        );
        let defs = Definitions::parse(["ciLimit=30"]).unwrap();
        let flags = GateFlags {
            ci: true,
            no_msg_dump: true,
            ..Default::default()
        };
        let config = GateConfig::load(dir.path(), flags, &defs).unwrap();
        assert_eq!(config.allowed["TS6133"], 4);
        assert_eq!(config.ci_limit, 30);
        assert_eq!(config.ci_files_per_message, 2);
        assert_eq!(config.eslint_path.as_deref(), Some("lint.json"));
        assert!(config.ci);
        assert!(!config.dump_messages);

        let no_lint = GateFlags {
            no_lint: true,
            ..Default::default()
        };
        assert_eq!(GateConfig::load(dir.path(), no_lint, &defs).unwrap().eslint_path, None);
    }

    #[test]
    fn test_malformed_allow_list() {
        let dir = project(r#"{"ciBuilder": {"allowed": {"TS6133": "four"}}}"#);
        let err = GateConfig::load(dir.path(), GateFlags::default(), &Definitions::default()).unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));

        let missing = tempfile::tempdir().unwrap();
        let err = GateConfig::load(missing.path(), GateFlags::default(), &Definitions::default()).unwrap_err();
        assert!(matches!(err, GateError::Read { .. }));
    }
}
