//! Tracing setup for the cibuilder binaries.
//!
//! Console output meant for people goes through [`crate::console::Console`];
//! the subscriber installed here carries the structured step events and is
//! written to stderr so it never interleaves with CI service messages.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG` when it holds valid directives, else `level`.
fn env_filter(rust_log: Option<&str>, level: Level) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()))
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Only the first call in a process
/// has any effect.
pub fn init_tracing(json: bool, level: Level) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (json_lines, plain_lines) = if json {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr).json()),
            None,
        )
    } else {
        (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(env_filter(rust_log.as_deref(), level))
        .with(json_lines)
        .with(plain_lines)
        .try_init()
        .ok();
}
