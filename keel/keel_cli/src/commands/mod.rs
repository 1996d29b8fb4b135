//! Command implementations

pub mod boot;
pub mod content;

use keel_core::utils::LogLevel;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber, writing to stderr so stdout stays parseable.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: Option<LogLevel>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(LogLevel::Warning).as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
