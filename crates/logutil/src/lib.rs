//! Utilities for logging.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Structured json output, one object per line.
    Json,
    /// Full text output including file and line numbers.
    #[default]
    Full,
    /// Compact text output.
    Compact,
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Configure the global tracing subscriber.
///
/// RUST_LOG takes precedence over `default_level` when set.
///
/// Errors if a global subscriber has already been set.
pub fn configure_global_logger(
    default_level: Level,
    mode: LoggingMode,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let builder = SubscriberBuilder::default().with_env_filter(env_filter(default_level));

    match mode {
        LoggingMode::Json => {
            let subscriber = builder.json().with_current_span(true).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LoggingMode::Full => {
            let subscriber = builder.with_file(true).with_line_number(true).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LoggingMode::Compact => {
            let subscriber = builder.compact().finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}

/// Set up logging for tests.
///
/// Logs go through the test writer so they're captured per test. Safe to call
/// more than once.
pub fn init_test() {
    let subscriber = SubscriberBuilder::default()
        .with_test_writer()
        .with_env_filter(env_filter(Level::ERROR))
        .with_file(true)
        .with_line_number(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
