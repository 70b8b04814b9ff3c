//! Producers of diagnostics.
//!
//! The compiler decides which files belong to the project; later sources
//! (the linter, pre-computed reports) only contribute messages for files that
//! are already tracked.

pub mod eslint;
pub mod report;
pub mod tsc;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use cibuilder_core::process::{CommandLine, CommandOutput};

pub use eslint::EslintSource;
pub use report::ReportSource;
pub use tsc::TscSource;

use crate::diagnostic::{Diagnostic, FileInfo, FileMessages};
use crate::error::GateError;
use crate::results::ProjectResults;

/// Files of the project being checked and their diagnostics so far.
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    project_dir: PathBuf,
    out_directory: String,
    files: BTreeMap<String, FileMessages>,
}

impl ProjectFiles {
    /// `project_dir` is made absolute against the current directory.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let dir = project_dir.into();
        let dir = if dir.is_absolute() {
            dir
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&dir))
                .unwrap_or(dir)
        };
        Self {
            project_dir: normalize(&dir),
            out_directory: ".".to_string(),
            files: BTreeMap::new(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn set_out_directory(&mut self, dir: impl Into<String>) {
        self.out_directory = dir.into();
    }

    fn key(&self, path: &str) -> String {
        normalize(&self.project_dir.join(path)).display().to_string()
    }

    /// Start tracking `path`. Dependencies under `node_modules` are ignored.
    pub fn track(&mut self, path: &str) {
        if path.contains("node_modules") {
            return;
        }
        let key = self.key(path);
        if self.files.contains_key(&key) {
            return;
        }
        let info = FileInfo {
            file_name: path.to_string(),
            abs_path: key.clone(),
            out_directory: self.out_directory.clone(),
        };
        self.files.insert(key, FileMessages::new(info));
    }

    /// Record `diagnostic` for `path`. Returns false when the file is not
    /// tracked, in which case the diagnostic is dropped.
    pub fn add(&mut self, path: &str, diagnostic: Diagnostic) -> bool {
        let key = self.key(path);
        match self.files.get_mut(&key) {
            Some(file) => {
                file.push(diagnostic);
                true
            }
            None => false,
        }
    }

    /// Absolute paths of the tracked files.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_results(self) -> ProjectResults {
        ProjectResults::aggregate(self.files.into_values())
    }
}

/// Resolve `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// A tool or file contributing diagnostics.
#[async_trait]
pub trait DiagnosticSource: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(&self, project: &mut ProjectFiles) -> Result<(), GateError>;
}

/// Node based command-line tool, preferring the project's local install.
#[derive(Debug, Clone)]
pub struct NodeTool {
    name: String,
}

impl NodeTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn command(&self, project_dir: &Path) -> CommandLine {
        let local = project_dir.join("node_modules").join(".bin").join(&self.name);
        let command = if local.exists() {
            CommandLine::new(local.display().to_string())
        } else {
            CommandLine::new("npx").arg("--no-install").arg(&self.name)
        };
        command.current_dir(project_dir)
    }

    /// Run with `args`, returning the output whatever the exit code.
    pub async fn output<I, S>(&self, project_dir: &Path, args: I) -> Result<CommandOutput, GateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(project_dir)
            .args(args)
            .output()
            .await
            .map_err(|e| GateError::tool(&self.name, e.to_string()))
    }
}
