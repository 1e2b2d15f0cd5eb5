//! Error types for ignis-renderer.

use std::path::PathBuf;

use thiserror::Error;

use ignis_core::ModelError;

/// All errors that can arise while synthesising configuration files.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// A domain collaborator failed; propagated unchanged.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model asks for something the nginx binary cannot do.
    #[error("{subject} requires {feature}, which this nginx build does not support")]
    Unsupported {
        feature: &'static str,
        subject: String,
    },

    /// An entity lacks a value needed to render it.
    #[error("{subject} has no {field}")]
    MissingField {
        subject: String,
        field: &'static str,
    },

    /// Filesystem error (GeoIP cache).
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No GeoIP database could be fetched and none is cached.
    #[error("GeoIP database unavailable: {0}")]
    GeoIpUnavailable(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
