//! TypeScript compiler diagnostics.
//!
//! Runs `tsc --noEmit --pretty false --listFiles -p <tsconfig>` and reads its
//! plain output, which interleaves the list of program files with
//! diagnostics of the form `file(line,col): error TS2322: message`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::{DiagnosticSource, NodeTool, ProjectFiles};
use crate::diagnostic::{Diagnostic, MessageCategory};
use crate::error::GateError;

pub const ISSUER: &str = "typescript";

/// "No inputs were found in config file" is not fatal.
const NO_INPUTS: &str = "TS18003";

/// Extensions of the files `--listFiles` reports.
const SOURCE_EXTENSIONS: [&str; 8] = [".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"];

static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)\((\d+),(\d+)\): (error|warning|message) (TS\d+): (.*)$").expect("valid regex literal")
});

static GLOBAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(error|warning|message) (TS\d+): (.*)$").expect("valid regex literal"));

/// Parsed `tsc` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TscOutput {
    /// Program files in the order tsc listed them.
    pub files: Vec<String>,
    /// `(file, diagnostic)` pairs.
    pub diagnostics: Vec<(String, Diagnostic)>,
    /// Diagnostics not attached to a file, e.g. configuration errors.
    pub global: Vec<Diagnostic>,
}

fn category(word: &str) -> MessageCategory {
    match word {
        "error" => MessageCategory::Error,
        _ => MessageCategory::Warning,
    }
}

/// Parse the output of `tsc --pretty false --listFiles`.
pub fn parse_output(stdout: &str) -> TscOutput {
    let mut output = TscOutput::default();

    // Continuation lines belong to whichever diagnostic came last.
    let mut last_global = false;
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            let last = if last_global {
                output.global.last_mut()
            } else {
                output.diagnostics.last_mut().map(|(_, d)| d)
            };
            if let Some(d) = last {
                d.message.push_str(line);
            }
            continue;
        }
        if let Some(c) = LOCATED.captures(line) {
            let diagnostic = Diagnostic::new(ISSUER, category(&c[4]), &c[5], &c[6])
                .at(c[2].parse().unwrap_or(1), c[3].parse().unwrap_or(1));
            output.diagnostics.push((c[1].to_string(), diagnostic));
            last_global = false;
        } else if let Some(c) = GLOBAL.captures(line) {
            output
                .global
                .push(Diagnostic::new(ISSUER, category(&c[1]), &c[2], &c[3]));
            last_global = true;
        } else if SOURCE_EXTENSIONS.iter().any(|ext| line.trim_end().ends_with(ext)) {
            output.files.push(line.trim().to_string());
        }
    }
    output
}

/// [`DiagnosticSource`] running the TypeScript compiler. Tracks every file of
/// the program.
#[derive(Debug, Clone)]
pub struct TscSource {
    tsconfig_path: String,
    tool: NodeTool,
}

impl TscSource {
    pub fn new(tsconfig_path: impl Into<String>) -> Self {
        Self {
            tsconfig_path: tsconfig_path.into(),
            tool: NodeTool::new("tsc"),
        }
    }

    fn out_dir(&self, project: &ProjectFiles) -> Option<String> {
        let text = std::fs::read_to_string(project.project_dir().join(&self.tsconfig_path)).ok()?;
        let config: Value = serde_json::from_str(&text).ok()?;
        config["compilerOptions"]["outDir"].as_str().map(str::to_string)
    }

    /// Fold parsed output into `project`.
    pub fn apply(&self, output: TscOutput, exit_code: i32, stderr: &str, project: &mut ProjectFiles) -> Result<(), GateError> {
        let fatal: Vec<String> = output
            .global
            .iter()
            .filter(|d| d.category == MessageCategory::Error && d.code != NO_INPUTS)
            .map(|d| format!("{}: {}", d.code, d.message))
            .collect();
        if !fatal.is_empty() {
            return Err(GateError::tool("tsc", fatal.join("\n")));
        }
        // 1 and 2 mean diagnostics were reported. A project without inputs
        // lists no files either.
        let crashed = !(0..=2).contains(&exit_code);
        let no_inputs = output.global.iter().any(|d| d.code == NO_INPUTS);
        if crashed || (exit_code != 0 && output.files.is_empty() && !no_inputs) {
            let detail = stderr.trim();
            return Err(GateError::tool(
                "tsc",
                if detail.is_empty() {
                    format!("exited with code {exit_code}")
                } else {
                    detail.to_string()
                },
            ));
        }

        if let Some(dir) = self.out_dir(project) {
            project.set_out_directory(dir);
        }
        for file in &output.files {
            project.track(file);
        }
        for (file, diagnostic) in output.diagnostics {
            project.add(&file, diagnostic);
        }
        Ok(())
    }
}

#[async_trait]
impl DiagnosticSource for TscSource {
    fn name(&self) -> &str {
        "tsc"
    }

    async fn collect(&self, project: &mut ProjectFiles) -> Result<(), GateError> {
        let out = self
            .tool
            .output(
                project.project_dir(),
                ["--noEmit", "--pretty", "false", "--listFiles", "-p", self.tsconfig_path.as_str()],
            )
            .await?;
        let parsed = parse_output(&out.stdout);
        tracing::debug!(
            files = parsed.files.len(),
            diagnostics = parsed.diagnostics.len(),
            exit_code = out.exit_code,
            "tsc finished"
        );
        self.apply(parsed, out.exit_code, &out.stderr, project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
/work/node_modules/typescript/lib/lib.d.ts
/work/src/index.ts
/work/src/util.ts
src/index.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.
src/util.ts(10,1): error TS2345: Argument of type 'A' is not assignable to parameter of type 'B'.
  Property 'x' is missing in type 'A'.
src/util.ts(2,5): message TS6133: 'y' is declared but its value is never read.
";

    #[test]
    fn test_parse_output() {
        let out = parse_output(OUTPUT);
        assert_eq!(out.files.len(), 3);
        assert_eq!(out.diagnostics.len(), 3);
        assert!(out.global.is_empty());

        let (file, d) = &out.diagnostics[1];
        assert_eq!(file, "src/util.ts");
        assert_eq!(d.code, "TS2345");
        assert_eq!((d.line, d.character), (10, 1));
        assert!(d.message.ends_with("type 'B'.  Property 'x' is missing in type 'A'."));
        assert_eq!(out.diagnostics[2].1.category, MessageCategory::Warning);
    }

    #[test]
    fn test_apply_tracks_program_files() {
        let mut project = ProjectFiles::new("/work");
        TscSource::new("tsconfig.json")
            .apply(parse_output(OUTPUT), 2, "", &mut project)
            .unwrap();

        let results = project.into_results();
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.num_errors, 2);
        assert_eq!(results.num_warnings, 1);
        let util = &results.results["/work/src/util.ts"].messages;
        assert_eq!(util[0].code, "TS6133");
        assert_eq!(util[1].code, "TS2345");
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let out = parse_output("error TS5058: The specified path does not exist: 'nope.json'.\n");
        let mut project = ProjectFiles::new("/work");
        let err = TscSource::new("nope.json").apply(out, 1, "", &mut project).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tsc: TS5058: The specified path does not exist: 'nope.json'."
        );
    }

    #[test]
    fn test_project_without_inputs_is_empty() {
        let out = parse_output(
            "error TS18003: No inputs were found in config file '/work/tsconfig.json'. \
             Specified 'include' paths were '[\"src\"]' and 'exclude' paths were '[]'.\n",
        );
        assert!(out.files.is_empty());
        assert_eq!(out.global.len(), 1);

        let mut project = ProjectFiles::new("/work");
        TscSource::new("tsconfig.json").apply(out, 1, "", &mut project).unwrap();
        let results = project.into_results();
        assert!(results.results.is_empty());
        assert_eq!(results.num_messages, 0);
    }

    #[test]
    fn test_only_source_paths_are_listed_files() {
        let out = parse_output(
            "Version 5.4.5\n/work/src/index.ts\n/work/src/view.tsx\nFound 0 errors.\n/work/lib/legacy.js\n",
        );
        assert_eq!(
            out.files,
            vec!["/work/src/index.ts", "/work/src/view.tsx", "/work/lib/legacy.js"]
        );
    }

    #[test]
    fn test_crash_is_a_tool_error() {
        let mut project = ProjectFiles::new("/work");
        let err = TscSource::new("tsconfig.json")
            .apply(TscOutput::default(), 1, "npm ERR! could not determine executable to run\n", &mut project)
            .unwrap_err();
        assert!(matches!(err, GateError::Tool { .. }));
        assert!(err.to_string().contains("could not determine executable"));
    }
}
