//! Error types for ignis-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from reading the domain model or app config.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A referenced entity is absent from the snapshot.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// An environment override could not be interpreted.
    #[error("invalid value for {key}: {message}")]
    InvalidOverride { key: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ModelError {
    ModelError::Io {
        path: path.into(),
        source,
    }
}
