//! Log file setup.
//!
//! Everything is appended to one file so the unattended daemon can be
//! debugged after the fact. `RUST_LOG` overrides the default level.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = "/tmp/blue-kasa.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: LevelFilter,

    /// File that log lines are appended to
    pub file_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::DEBUG,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines on drop and must be kept alive
/// for as long as the process logs.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard> {
    let directory = config
        .file_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = config
        .file_path
        .file_name()
        .unwrap_or_else(|| OsStr::new("blue-kasa.log"));

    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_fixed_location() {
        let config = LogConfig::default();
        assert_eq!(config.file_path, PathBuf::from("/tmp/blue-kasa.log"));
        assert_eq!(config.level, LevelFilter::DEBUG);
    }

    #[test]
    fn creates_missing_log_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = LogConfig {
            level: LevelFilter::INFO,
            file_path: dir.path().join("nested").join("blue-kasa.log"),
        };

        // Another test may already own the global subscriber; the directory
        // is created before that matters.
        let _ = init_logging(&config);
        assert!(dir.path().join("nested").is_dir());
    }
}
