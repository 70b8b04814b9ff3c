//! Structured observability hooks for builder and gate lifecycle events.
//!
//! - `step_span` for instrumenting a step's future
//! - Emission functions for step start/finish, run completion and gate verdicts
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::info;

/// Span tagging everything a step logs with its name.
///
/// ```ignore
/// use tracing::Instrument;
/// handler().instrument(step_span("publish")).await;
/// ```
pub fn step_span(step: &str) -> tracing::Span {
    tracing::info_span!("cibuilder.step", step = %step)
}

/// Emit event: step started.
pub fn emit_step_started(step: &str) {
    info!(event = "step.started", step = %step);
}

/// Emit event: step finished with duration and outcome.
pub fn emit_step_finished(step: &str, duration_ms: u64, success: bool) {
    info!(
        event = "step.finished",
        step = %step,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: builder run finished with its exit code and failure trace.
pub fn emit_run_finished(exit_code: i32, failure_trace: &str) {
    info!(
        event = "run.finished",
        exit_code = exit_code,
        failure_trace = %failure_trace,
    );
}

/// Emit event: diagnostics gate evaluated.
pub fn emit_gate_evaluated(verdict: &str, errors: usize, warnings: usize) {
    info!(
        event = "gate.evaluated",
        verdict = %verdict,
        errors = errors,
        warnings = warnings,
    );
}

/// Emit event: a best-effort step failed and was downgraded to a warning.
pub fn emit_step_downgraded(step: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "step.downgraded", step = %step, error = %error);
}
