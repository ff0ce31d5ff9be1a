//! Error types for plug control, the device listener and configuration.
//!
//! Only [`ConfigError`] is ever fatal. Everything that can go wrong after
//! startup is recovered where it happens and shows up in the log as an
//! `Unknown` power state, an empty discovery or a return to waiting for the
//! remote.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the smart-plug tool.
#[derive(Debug, Error)]
pub enum PlugError {
    /// Group name did not resolve, even after one rediscovery.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// The tool ran but exited with a non-zero status.
    #[error("command `{command}` failed with status {status}")]
    CommandFailure { command: String, status: String },

    /// The tool could not be started at all.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Discovery output was not the JSON shape we expect.
    #[error("malformed discovery output: {0}")]
    MalformedDiscovery(#[from] serde_json::Error),
}

/// Failures on the remote's input handle.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The handle went away mid-read, usually because the remote was unplugged.
    #[error("read from input device {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Startup configuration problems. These stop the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
