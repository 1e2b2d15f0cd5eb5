//! Error types for ignis-sync.

use std::path::PathBuf;

use thiserror::Error;

use ignis_core::ModelError;
use ignis_renderer::RenderError;

/// All errors that can arise from a synthesis pass or a tree replace.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A provider failed; the whole pass is aborted.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The domain source could not be read.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
