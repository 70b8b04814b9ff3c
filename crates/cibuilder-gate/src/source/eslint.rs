//! ESLint diagnostics for the files tracked by the compiler.
//!
//! Every lint message is reported as a warning regardless of the severity
//! ESLint assigns; the allow list decides whether it fails the build.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DiagnosticSource, NodeTool, ProjectFiles};
use crate::diagnostic::{Diagnostic, MessageCategory};
use crate::error::GateError;

pub const ISSUER: &str = "eslint";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintResult {
    file_path: String,
    #[serde(default)]
    messages: Vec<LintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintMessage {
    rule_id: Option<String>,
    message: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
    end_column: Option<u32>,
}

/// Parse `eslint --format json` output into `(file, diagnostic)` pairs.
pub fn parse_report(json: &str) -> Result<Vec<(String, Diagnostic)>, GateError> {
    let results: Vec<LintResult> = serde_json::from_str(json)
        .map_err(|e| GateError::tool("eslint", format!("unreadable report: {e}")))?;

    let mut out = Vec::new();
    for result in results {
        for m in result.messages {
            let code = m.rule_id.unwrap_or_else(|| "unknown".to_string());
            let mut diagnostic = Diagnostic::new(ISSUER, MessageCategory::Warning, code, m.message)
                .at(m.line.max(1), m.column.max(1));
            if let Some(end) = m.end_column {
                diagnostic.width = end.saturating_sub(m.column);
            }
            out.push((result.file_path.clone(), diagnostic));
        }
    }
    Ok(out)
}

/// [`DiagnosticSource`] running ESLint with an explicit configuration file.
#[derive(Debug, Clone)]
pub struct EslintSource {
    config_path: String,
    tool: NodeTool,
}

impl EslintSource {
    pub fn new(config_path: impl Into<String>) -> Self {
        Self {
            config_path: config_path.into(),
            tool: NodeTool::new("eslint"),
        }
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }
}

#[async_trait]
impl DiagnosticSource for EslintSource {
    fn name(&self) -> &str {
        "eslint"
    }

    async fn collect(&self, project: &mut ProjectFiles) -> Result<(), GateError> {
        let files = project.paths();
        if files.is_empty() {
            tracing::debug!("no files to lint");
            return Ok(());
        }

        let mut args = vec![
            "--no-eslintrc".to_string(),
            "-c".to_string(),
            self.config_path.clone(),
            "--format".to_string(),
            "json".to_string(),
        ];
        args.extend(files);
        let out = self.tool.output(project.project_dir(), args).await?;

        // 1 means lint problems were found, 2 a configuration or internal error.
        if out.exit_code > 1 || out.exit_code < 0 {
            let detail = out.stderr.trim();
            return Err(GateError::tool(
                "eslint",
                if detail.is_empty() {
                    format!("exited with code {}", out.exit_code)
                } else {
                    detail.to_string()
                },
            ));
        }

        let diagnostics = parse_report(&out.stdout)?;
        let mut dropped = 0usize;
        for (file, diagnostic) in diagnostics {
            if !project.add(&file, diagnostic) {
                dropped += 1;
            }
        }
        tracing::debug!(dropped, "eslint finished");
        Ok(())
    }
}
