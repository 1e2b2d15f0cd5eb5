use std::path::PathBuf;

use thiserror::Error;

/// Failures of the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A strict reload was requested while the server is stopped.
    #[error("nginx is not running")]
    NotRunning,

    /// Regenerating the configuration tree failed; nothing was signalled.
    #[error("configuration generation failed: {0}")]
    Generation(String),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// nginx exited non-zero; `output` is its combined stdout and stderr.
    #[error("nginx {action} failed: {output}")]
    Command { action: &'static str, output: String },
}

/// Error surface for the daemon runtime, control protocol and log files.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("model error: {0}")]
    Model(#[from] ignis_core::ModelError),

    #[error("capability probe failed: {0}")]
    Detect(#[from] ignis_detector::DetectError),

    #[error("sync error: {0}")]
    Sync(#[from] ignis_sync::SyncError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid search query: {0}")]
    Query(#[from] regex::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
