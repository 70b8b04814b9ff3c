//! Diagnostics read from a JSON report written by an earlier run.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{DiagnosticSource, ProjectFiles};
use crate::diagnostic::FileMessages;
use crate::error::GateError;

/// [`DiagnosticSource`] replaying a list of [`FileMessages`].
///
/// Unlike the linter, a report also decides which files belong to the
/// project: every file it names is tracked.
#[derive(Debug, Clone)]
pub struct ReportSource {
    path: PathBuf,
}

impl ReportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<Vec<FileMessages>, GateError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| GateError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| GateError::Config {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl DiagnosticSource for ReportSource {
    fn name(&self) -> &str {
        "report"
    }

    async fn collect(&self, project: &mut ProjectFiles) -> Result<(), GateError> {
        for file in self.read()? {
            project.set_out_directory(file.info.out_directory.clone());
            project.track(&file.info.file_name);
            for diagnostic in file.messages {
                project.add(&file.info.file_name, diagnostic);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(
            &path,
            r#"[{
                "fileName": "src/index.ts",
                "absPath": "/work/src/index.ts",
                "outDirectory": "dist",
                "messages": [
                    {"message": "Line too long", "line": 4, "character": 1, "issuer": "eslint", "category": "warning", "type": "max-len"},
                    {"message": "Unused", "line": 2, "character": 7, "issuer": "typescript", "category": "error", "type": "TS6133"}
                ]
            }]"#,
        )
        .unwrap();

        let mut project = ProjectFiles::new("/work");
        ReportSource::new(&path).collect(&mut project).await.unwrap();
        let results = project.into_results();

        let file = &results.results["src/index.ts"];
        assert_eq!(file.info.out_directory, "dist");
        assert_eq!(file.messages[0].code, "TS6133");
        assert_eq!(results.num_errors, 1);
        assert_eq!(results.num_warnings, 1);
    }

    #[tokio::test]
    async fn test_missing_report() {
        let mut project = ProjectFiles::new("/work");
        let err = ReportSource::new("/nonexistent/report.json")
            .collect(&mut project)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Read { .. }));
    }
}
