//! Tracing setup: daily rolling log file, console output only when verbose
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::errors::{RagError, Result};

/// File name prefix of the rolling log
pub const LOG_FILE_PREFIX: &str = "ragbuddy.log";

/// Filter from `RUST_LOG`, else `default`
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
///
/// Events always go to `{log_dir}/ragbuddy.log.YYYY-MM-DD`. With `verbose`
/// they are echoed to stderr as well, so answers on stdout stay clean.
///
/// The file writer is flushed when the returned guard is dropped; hold it
/// until the process is about to exit.
#[must_use = "dropping the guard stops the log writer"]
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };

    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| RagError::Generic(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_events_flushed_when_guard_dropped() {
        let temp = TempDir::new().unwrap();
        let log_dir = temp.path().join("nested").join("logs");

        let guard = init(&log_dir, false).unwrap();
        assert!(log_dir.is_dir());

        tracing::error!("query failed before exit");
        drop(guard);

        let written: String = std::fs::read_dir(&log_dir)
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path()).ok())
            .collect();
        assert!(written.contains("query failed before exit"));
    }
}
