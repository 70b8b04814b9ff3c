//! cibuilder diagnostics gate
//!
//! Compiles and lints a TypeScript project, aggregates the diagnostics, and
//! decides whether their counts stay within the per-code allowances declared
//! in the project's tsconfig file.

pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod formatter;
pub mod results;
pub mod source;
pub mod status;

pub use compiler::{check_project, check_sources, compile_project, sources_for};
pub use config::{Definitions, GateConfig, GateFlags};
pub use diagnostic::{Diagnostic, FileInfo, FileMessages, MessageCategory, MessageInfo, MessageReference};
pub use error::GateError;
pub use formatter::{format_ci_results, format_failure_message, format_project_results, format_results};
pub use results::ProjectResults;
pub use source::{DiagnosticSource, EslintSource, ProjectFiles, ReportSource, TscSource};
pub use status::{get_project_status, AllowanceMap, ExitCode, ProjectStatus, TypeStatus};
