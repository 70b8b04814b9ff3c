//! Project compilation and the gate entry point.
//!
//! [`compile_project`] runs the configured diagnostic sources in order and
//! aggregates what they report; [`check_project`] turns the aggregate into an
//! [`ExitCode`], printing the results and recording the failure in the log
//! file when the verdict is not OK.

use cibuilder_core::{obs, Console, Exception, LogFile};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::formatter::{format_failure_message, format_project_results};
use crate::results::ProjectResults;
use crate::source::{DiagnosticSource, EslintSource, ProjectFiles, TscSource};
use crate::status::{get_project_status, ExitCode};

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Sources for `config`: the compiler, then the linter unless disabled.
pub fn sources_for(config: &GateConfig) -> Vec<Box<dyn DiagnosticSource>> {
    let mut sources: Vec<Box<dyn DiagnosticSource>> =
        vec![Box::new(TscSource::new(config.tsconfig_path.clone()))];
    if let Some(eslint) = &config.eslint_path {
        sources.push(Box::new(EslintSource::new(eslint.clone())));
    }
    sources
}

/// Collect diagnostics from every source. The first source failure aborts.
pub async fn compile_project(
    config: &GateConfig,
    sources: &[Box<dyn DiagnosticSource>],
) -> Result<ProjectResults, GateError> {
    let mut project = ProjectFiles::new(&config.project_dir);
    for source in sources {
        tracing::debug!(source = source.name(), files = project.len(), "collecting diagnostics");
        source.collect(&mut project).await?;
    }
    Ok(project.into_results())
}

// ---------------------------------------------------------------------------
// Gate entry point
// ---------------------------------------------------------------------------

/// Compile and lint the project described by `config` and gate the result.
pub async fn check_project(config: &GateConfig, console: &Console, log_file: &LogFile) -> ExitCode {
    check_sources(config, &sources_for(config), console, log_file).await
}

/// [`check_project`] with explicit diagnostic sources.
pub async fn check_sources(
    config: &GateConfig,
    sources: &[Box<dyn DiagnosticSource>],
    console: &Console,
    log_file: &LogFile,
) -> ExitCode {
    if config.verbose {
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        console.log(format!("compiling project with {}", names.join(", ")));
    }

    let results = match compile_project(config, sources).await {
        Ok(results) => results,
        Err(e) => {
            let err = Exception::new(format!("Failure during project compilation: {e}"))
                .with_cause(Exception::from(e));
            console.error(&err, false);
            dump(config, console, log_file);
            obs::emit_gate_evaluated(ExitCode::NodeError.as_str(), 0, 0);
            return ExitCode::NodeError;
        }
    };

    if config.verbose {
        console.log(format!(
            "found {} messages ({} errors, {} warnings) in {} files",
            results.num_messages,
            results.num_errors,
            results.num_warnings,
            results.results.len()
        ));
    }

    let status = get_project_status(&results, &config.allowed);
    obs::emit_gate_evaluated(status.status.as_str(), results.num_errors, results.num_warnings);

    if status.status != ExitCode::Ok {
        console.log(format_project_results(
            &status,
            &results,
            config.ci,
            config.ci_limit,
            config.ci_files_per_message,
        ));
        let message = format_failure_message(&status, &results, &config.tsconfig_path);
        console.error(&Exception::new(message), false);
        dump(config, console, log_file);
    }
    status.status
}

fn dump(config: &GateConfig, console: &Console, log_file: &LogFile) {
    if !config.dump_messages {
        return;
    }
    if let Err(e) = log_file.dump(&console.messages()) {
        tracing::warn!(path = %log_file.path().display(), error = %e, "unable to dump messages");
    }
}
