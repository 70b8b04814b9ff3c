//! Process boundary of a builder run.

use super::machine::CiBuilder;
use super::policy::ReleasePolicy;
use crate::exception::Exception;
use crate::obs;

/// Run `builder` to completion and return the process exit code.
///
/// Failures are reported once, wrapped with the failing step trace
/// (``Failures in `test -> CI-Builder`: ...``). With `dump_messages`, the
/// warnings and errors of the run are merged into the log file.
pub async fn run_builder<P: ReleasePolicy>(builder: &mut CiBuilder<P>, dump_messages: bool) -> i32 {
    let console = builder.context().console.clone();
    console.enable_local_blocks();

    let result = builder.run().await;
    let trace = builder.state().failure_trace();
    let log_file = &builder.context().log_file;

    let code = match result {
        Err(err) => {
            let report = Exception::new(format!("Failures in `{trace}`: {}", err.message)).with_cause(err);
            console.error(&report, true);
            if dump_messages {
                if let Err(dump_err) = log_file.dump(&console.messages()) {
                    tracing::warn!(error = %dump_err, "unable to dump messages");
                }
            }
            1
        }
        Ok(()) => {
            if dump_messages {
                if let Err(dump_err) = log_file.dump(&console.messages()) {
                    console.log(format!("Unable to dump messages: {dump_err}"));
                }
            }
            console.log("Process is done.");
            0
        }
    };

    console.disable_local_blocks();
    obs::emit_run_finished(code, &trace);
    code
}
