//! Run-scoped warning/error collection and the persisted log file.
//!
//! The console records every warning and error it prints into a
//! [`RunMessages`] value. At the end of the run the builder hands it to
//! [`LogFile::dump`], which merges it with whatever an earlier step of the
//! same CI job already wrote, so the notifier can report all of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::exception::{Exception, Result};

/// Default location of the log file, relative to the project root.
pub const DEFAULT_LOG_FILE: &str = "./cibuilder-log.json";

/// A message and the epoch milliseconds at which it was recorded.
pub type TimedMessage = (String, i64);

/// Warnings and errors recorded during one builder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMessages {
    pub errors: Vec<TimedMessage>,
    pub warnings: Vec<TimedMessage>,
}

impl RunMessages {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push((message.into(), now_millis()));
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push((message.into(), now_millis()));
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// On-disk contents of the log file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderMessages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_release: Option<bool>,
    #[serde(default)]
    pub errors: Vec<TimedMessage>,
    #[serde(default)]
    pub warnings: Vec<TimedMessage>,
}

impl BuilderMessages {
    pub fn is_release(&self) -> bool {
        self.is_release.unwrap_or(false)
    }
}

/// Handle to the JSON log file shared between the builder, the gate and the
/// notifier.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

impl Default for LogFile {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILE)
    }
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BuilderMessages> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| Exception::from(e).context("failed to load log file"))?;
        serde_json::from_str(&text).map_err(|e| Exception::from(e).context("failed to load log file"))
    }

    fn write(&self, messages: &BuilderMessages) -> Result<()> {
        let json = serde_json::to_string_pretty(messages)?;
        std::fs::write(&self.path, json).map_err(|e| {
            Exception::from(e).context(format!("unable to write {}", self.path.display()))
        })
    }

    /// Mark the log file as belonging to a release build.
    ///
    /// A missing or unreadable file is replaced by an empty one.
    pub fn set_release_flag(&self) -> Result<()> {
        let mut messages = self.load().unwrap_or_default();
        messages.is_release = Some(true);
        self.write(&messages)
    }

    /// Append `run` to the file contents. Nothing is written when there is
    /// nothing to report.
    pub fn dump(&self, run: &RunMessages) -> Result<()> {
        let mut messages = BuilderMessages {
            is_release: None,
            errors: run.errors.clone(),
            warnings: run.warnings.clone(),
        };
        if let Ok(current) = self.load() {
            messages.is_release = current.is_release;
            messages.errors.extend(current.errors);
            messages.warnings.extend(current.warnings);
        }

        if messages.errors.is_empty() && messages.warnings.is_empty() {
            return Ok(());
        }
        self.write(&messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_file(dir: &tempfile::TempDir) -> LogFile {
        LogFile::new(dir.path().join("cibuilder-log.json"))
    }

    #[test]
    fn test_dump_skips_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let file = log_file(&dir);
        file.dump(&RunMessages::default()).unwrap();
        assert!(!file.path().exists());
    }

    #[test]
    fn test_dump_merges_with_existing_and_keeps_release_flag() {
        let dir = tempfile::tempdir().unwrap();
        let file = log_file(&dir);
        file.set_release_flag().unwrap();

        let mut first = RunMessages::default();
        first.record_warning("lint drift");
        file.dump(&first).unwrap();

        let mut second = RunMessages::default();
        second.record_error("publish failed");
        file.dump(&second).unwrap();

        let stored = file.load().unwrap();
        assert!(stored.is_release());
        assert_eq!(stored.errors.len(), 1);
        assert_eq!(stored.errors[0].0, "publish failed");
        assert_eq!(stored.warnings[0].0, "lint drift");
    }

    #[test]
    fn test_wire_format() {
        let messages = BuilderMessages {
            is_release: Some(false),
            errors: vec![("boom".to_string(), 1_700_000_000_000)],
            warnings: vec![],
        };
        let value = serde_json::to_value(&messages).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "isRelease": false,
                "errors": [["boom", 1_700_000_000_000i64]],
                "warnings": [],
            })
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = log_file(&dir).load().unwrap_err();
        assert_eq!(err.message, "failed to load log file");
        assert!(err.cause.is_some());
    }
}
