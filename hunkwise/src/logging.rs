//! Tracing setup. The viewer owns the terminal, so it logs to a file; the
//! headless commands log to stderr.

use std::path::PathBuf;

use hunkwise_core::store::ReviewStore;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "hunkwise=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `<cache_dir>/hunkwise/logs`, where the viewer's log file lives.
///
/// Kept out of the store directory itself, which the review watcher observes.
pub fn log_dir() -> PathBuf {
    ReviewStore::default_base().join("logs")
}

/// Logs to `<cache_dir>/hunkwise/logs/hunkwise.log` through a non-blocking writer.
///
/// The returned guard flushes the writer on drop; keep it alive for the
/// whole run. Returns `None` (logging disabled) when the directory cannot be
/// created, since stderr belongs to the TUI.
pub fn init_viewer() -> Option<WorkerGuard> {
    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("hunkwise: cannot create log directory {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(&dir, "hunkwise.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Some(guard)
}

/// Logs to stderr for the headless commands.
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_outside_the_watched_store_directory() {
        let store = ReviewStore::default_base();
        let logs = log_dir();
        assert_ne!(logs, store);
        assert_eq!(logs.parent(), Some(store.as_path()));
    }
}
