//! The threshold gate: reconcile observed diagnostic counts with the
//! configured allowances and classify the project.
//!
//! Precedence of the verdict, first match wins:
//!
//! 1. an allow-listed error code exceeded its allowance (`ErrorException`)
//! 2. an allow-listed warning code exceeded its allowance (`WarningException`)
//! 3. errors of codes that are not allow-listed remain (`Error`)
//! 4. warnings of codes that are not allow-listed remain (`Warning`)
//! 5. some allowance is higher than what was found (`NeedsReadjustment`)
//! 6. otherwise `Ok`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostic::MessageCategory;
use crate::results::ProjectResults;

/// Diagnostic code → maximum number of occurrences allowed.
pub type AllowanceMap = BTreeMap<String, usize>;

/// Process exit code of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCode {
    Ok = 0,
    Warning = 1,
    Error = 2,
    WarningException = 3,
    ErrorException = 4,
    /// The compiler or linter could not be run.
    NodeError = 5,
    NeedsReadjustment = 6,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::Warning => "WARNING",
            ExitCode::Error => "ERROR",
            ExitCode::WarningException => "WARNING_EXCEPTION",
            ExitCode::ErrorException => "ERROR_EXCEPTION",
            ExitCode::NodeError => "NODE_ERROR",
            ExitCode::NeedsReadjustment => "NEEDS_READJUSTMENT",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one allow-listed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStatus {
    #[serde(rename = "type")]
    pub code: String,
    pub found: usize,
    pub allowed: usize,
    /// `found > allowed`.
    pub failed: bool,
}

impl TypeStatus {
    /// `found < allowed`: the allowance can be lowered.
    pub fn needs_readjustment(&self) -> bool {
        self.found < self.allowed
    }
}

/// Verdict of the gate plus the detail for every allow-listed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub status: ExitCode,
    pub exceptions: BTreeMap<String, TypeStatus>,
}

/// Classify `results` against `allowed`.
///
/// Codes missing from `allowed` only contribute through the total error and
/// warning counts.
pub fn get_project_status(results: &ProjectResults, allowed: &AllowanceMap) -> ProjectStatus {
    let mut error_counter = results.num_errors as i64;
    let mut warning_counter = results.num_warnings as i64;
    let mut error_exception = false;
    let mut warning_exception = false;
    let mut needs_readjustment = false;
    let mut exceptions = BTreeMap::new();

    for (code, &allowance) in allowed {
        let (found, category) = results
            .by_message
            .get(code)
            .map(|info| (info.count, info.category()))
            .unwrap_or((0, None));

        let entry = TypeStatus {
            code: code.clone(),
            found,
            allowed: allowance,
            failed: found > allowance,
        };
        needs_readjustment |= entry.needs_readjustment();

        match category {
            None => {}
            Some(MessageCategory::Error) => {
                error_counter -= found as i64;
                error_exception |= entry.failed;
            }
            Some(_) => {
                warning_counter -= found as i64;
                warning_exception |= entry.failed;
            }
        }
        exceptions.insert(code.clone(), entry);
    }

    let status = if error_exception {
        ExitCode::ErrorException
    } else if warning_exception {
        ExitCode::WarningException
    } else if error_counter > 0 {
        ExitCode::Error
    } else if warning_counter > 0 {
        ExitCode::Warning
    } else if needs_readjustment {
        ExitCode::NeedsReadjustment
    } else {
        ExitCode::Ok
    };

    ProjectStatus { status, exceptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, FileInfo, FileMessages};

    fn project(counts: &[(&str, MessageCategory, usize)]) -> ProjectResults {
        let mut file = FileMessages::new(FileInfo {
            file_name: "index.ts".into(),
            abs_path: "/p/index.ts".into(),
            out_directory: ".".into(),
        });
        let mut line = 1;
        for (code, category, n) in counts {
            for _ in 0..*n {
                file.push(Diagnostic::new("test", *category, *code, "msg").at(line, 1));
                line += 1;
            }
        }
        ProjectResults::aggregate(vec![file])
    }

    fn allow(pairs: &[(&str, usize)]) -> AllowanceMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_exit_code_values() {
        let codes: Vec<i32> = [
            ExitCode::Ok,
            ExitCode::Warning,
            ExitCode::Error,
            ExitCode::WarningException,
            ExitCode::ErrorException,
            ExitCode::NodeError,
            ExitCode::NeedsReadjustment,
        ]
        .iter()
        .map(|c| c.code())
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(serde_json::to_value(ExitCode::NeedsReadjustment).unwrap(), "NEEDS_READJUSTMENT");
    }

    #[test]
    fn test_unknown_code_with_zero_found_only_readjusts() {
        let results = project(&[]);
        let status = get_project_status(&results, &allow(&[("TS1", 2)]));
        assert_eq!(status.status, ExitCode::NeedsReadjustment);
        assert_eq!(status.exceptions["TS1"].found, 0);
        assert!(!status.exceptions["TS1"].failed);
    }

    #[test]
    fn test_non_error_categories_count_against_warnings() {
        let results = project(&[("TS6", MessageCategory::Info, 2)]);
        assert_eq!(results.num_warnings, 0);
        let status = get_project_status(&results, &allow(&[("TS6", 1)]));
        assert_eq!(status.status, ExitCode::WarningException);
    }
}
