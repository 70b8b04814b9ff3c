//! User-facing build output with CI-specific decorations.
//!
//! TeamCity and Travis understand special log lines (service messages, fold
//! markers); other environments get colored prefixes. Locally, blocks are
//! shown by prefixing each line with the name of the innermost open block.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use colored::Colorize;

use crate::environment::CiKind;
use crate::exception::Exception;
use crate::messages::RunMessages;

/// Destination for console lines.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes lines to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

#[derive(Debug, Default)]
struct ConsoleState {
    blocks: Vec<String>,
    local_blocks: bool,
    messages: RunMessages,
}

/// Build console bound to one CI kind.
pub struct Console {
    ci: CiKind,
    sink: Arc<dyn LineSink>,
    state: Mutex<ConsoleState>,
}

impl Console {
    pub fn new(ci: CiKind) -> Self {
        Self::with_sink(ci, Arc::new(StdoutSink))
    }

    pub fn with_sink(ci: CiKind, sink: Arc<dyn LineSink>) -> Self {
        Self {
            ci,
            sink,
            state: Mutex::new(ConsoleState::default()),
        }
    }

    pub fn ci(&self) -> CiKind {
        self.ci
    }

    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prefix output with block names. Only effective outside CI.
    pub fn enable_local_blocks(&self) {
        if self.ci == CiKind::None {
            let mut state = self.state();
            state.local_blocks = true;
            state.blocks.push("local".to_string());
        }
    }

    pub fn disable_local_blocks(&self) {
        let mut state = self.state();
        if state.local_blocks {
            state.local_blocks = false;
            state.blocks.clear();
        }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let prefix = {
            let state = self.state();
            match state.blocks.last() {
                Some(block) if state.local_blocks => {
                    let padding = "  ".repeat(state.blocks.len() - 1);
                    Some(format!("{padding}{} ", format!("[{block}]").bright_black()))
                }
                _ => None,
            }
        };
        match prefix {
            Some(prefix) => {
                for line in message.trim_end_matches('\n').split('\n') {
                    self.sink.write_line(&format!("{prefix}{line}"));
                }
            }
            None => self.sink.write_line(message),
        }
    }

    /// Print a warning and record it for the log file.
    pub fn warn(&self, err: &Exception) {
        let msg = &err.message;
        self.state().messages.record_warning(msg.clone());
        let line = match self.ci {
            CiKind::TeamCity => format!(
                "##teamcity[message text='{}' status='WARNING']",
                escape_teamcity(msg)
            ),
            CiKind::Travis => format!("##buildWarning: {msg}"),
            CiKind::Other | CiKind::None => format!("{}{msg}", "WARNING: ".yellow()),
        };
        self.log(line);
    }

    /// Print an error and record it for the log file. With `dump`, the full
    /// structured exception follows the error line.
    pub fn error(&self, err: &Exception, dump: bool) {
        let msg = &err.message;
        self.state().messages.record_error(msg.clone());
        let line = match self.ci {
            CiKind::TeamCity => format!(
                "##teamcity[buildProblem description='{}']",
                escape_teamcity(msg)
            ),
            CiKind::Travis => format!("##buildFailure: {msg}"),
            CiKind::Other | CiKind::None => format!("{}{msg}", "ERROR: ".red()),
        };
        self.log(line);
        if dump {
            let object = serde_json::to_string_pretty(&err.to_object())
                .unwrap_or_else(|_| err.message.clone());
            self.log(object);
        }
    }

    pub fn open_block(&self, name: &str, description: &str) {
        let line = match self.ci {
            CiKind::TeamCity => format!(
                "##teamcity[blockOpened name='{name}' description='{}']",
                escape_teamcity(description)
            ),
            CiKind::Travis if description.is_empty() => format!("travis_fold:start:{name}"),
            CiKind::Travis => format!("travis_fold:start:{name}\n{}", description.yellow()),
            _ if description.is_empty() => name.to_string(),
            _ => format!("{name}: {description}"),
        };
        self.log(line);
        self.state().blocks.push(name.to_string());
    }

    /// Close `name` and any block opened after it.
    pub fn close_block(&self, name: &str) {
        {
            let mut state = self.state();
            while let Some(last) = state.blocks.pop() {
                if last == name {
                    break;
                }
            }
        }
        match self.ci {
            CiKind::TeamCity => self.log(format!("##teamcity[blockClosed name='{name}']")),
            CiKind::Travis => self.log(format!("travis_fold:end:{name}")),
            CiKind::Other | CiKind::None => {}
        }
    }

    /// Snapshot of the warnings and errors recorded so far.
    pub fn messages(&self) -> RunMessages {
        self.state().messages.clone()
    }
}

/// Escape a value for a TeamCity service message.
///
/// See the "Escaped values" section of TeamCity's build script interaction docs.
pub fn escape_teamcity(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len());
    for c in msg.chars() {
        match c {
            '|' => out.push_str("||"),
            '\'' => out.push_str("|'"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            other => out.push(other),
        }
    }
    out
}
