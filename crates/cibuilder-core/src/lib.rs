//! cibuilder core library
//!
//! Release builder for npm packages on CI: environment detection, the step
//! state machine, CI-aware console output, and chat notifications.

pub mod build_util;
pub mod builder;
pub mod console;
pub mod environment;
pub mod exception;
pub mod git;
pub mod github;
pub mod messages;
pub mod notify;
pub mod obs;
pub mod policy;
pub mod process;
pub mod prompt;
pub mod registry;
pub mod telemetry;
pub mod version;

pub mod fakes;

pub use builder::{
    run_builder, BuildContext, BuildStep, BuilderRunState, CiBuilder, ReleaseInfo, ReleasePolicy,
    StepKind,
};
pub use console::{Console, LineSink, StdoutSink};
pub use environment::{BuildInfo, CiKind, Environment, PackageInfo, VarSource};
pub use exception::{Exception, Result, StepResult};
pub use messages::{BuilderMessages, LogFile, RunMessages, DEFAULT_LOG_FILE};
pub use notify::{SlackApi, SlackNotifier, TravisTitle};
pub use policy::{NpmPolicy, NpmPolicyConfig};
pub use process::{CommandLine, CommandOutput, ProcessError};
pub use telemetry::init_tracing;
pub use version::{Bump, Semver};

/// cibuilder version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
