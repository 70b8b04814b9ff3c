//! External command execution.
//!
//! Every collaborator that shells out (git, yarn, npm, tsc, eslint, user
//! hooks) goes through [`CommandLine`], which captures output and enforces an
//! optional timeout.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::process::Command;

use crate::exception::Exception;

/// Errors raised while running an external command.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with code {exit_code}")]
    Failed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl From<ProcessError> for Exception {
    fn from(err: ProcessError) -> Self {
        match &err {
            ProcessError::Failed { stdout, stderr, exit_code, .. } => Exception::new(err.to_string())
                .with_data(json!({
                    "exitCode": exit_code,
                    "stdout": stdout,
                    "stderr": stderr,
                })),
            _ => Exception::from_error(&err),
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Rendered command line.
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command to run, with its arguments and execution options.
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Zero disables the timeout.
    pub timeout_secs: u64,
    /// Forward output to the parent's stdio instead of capturing it.
    pub inherit_output: bool,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout_secs: 0,
            inherit_output: false,
        }
    }

    /// Split a shell-like command string on whitespace.
    ///
    /// Returns `None` for an empty string.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Run the command and return its output whatever the exit code.
    pub async fn output(&self) -> Result<CommandOutput, ProcessError> {
        let start = Instant::now();
        let rendered = self.to_string();

        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        if self.inherit_output {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let waited = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ProcessError::Timeout {
                command: rendered.clone(),
                secs: self.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|source| ProcessError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(command = %rendered, duration_ms, "command finished");

        Ok(CommandOutput {
            command: rendered,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }

    /// Run the command, treating a non-zero exit code as an error.
    pub async fn run(&self) -> Result<CommandOutput, ProcessError> {
        let output = self.output().await?;
        if !output.passed() {
            return Err(ProcessError::Failed {
                command: output.command,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Run the command and return its trimmed stdout.
    pub async fn read(&self) -> Result<String, ProcessError> {
        Ok(self.run().await?.stdout.trim().to_string())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_whitespace() {
        let cmd = CommandLine::parse("yarn  run build").unwrap();
        assert_eq!(cmd.program, "yarn");
        assert_eq!(cmd.args, vec!["run", "build"]);
        assert_eq!(cmd.to_string(), "yarn run build");
        assert!(CommandLine::parse("   ").is_none());
    }

    #[tokio::test]
    async fn test_read_trims_stdout() {
        let out = CommandLine::new("echo").arg("hello").read().await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_failing_command_keeps_output_in_exception() {
        let err = CommandLine::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Failed { exit_code: 3, .. }));

        let exception = Exception::from(err);
        assert_eq!(exception.message, "`sh -c echo oops >&2; exit 3` exited with code 3");
        let data = exception.data.unwrap();
        assert_eq!(data["stderr"].as_str().unwrap().trim(), "oops");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = CommandLine::new("definitely-not-a-real-binary-xyz")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
