//! # ignis-sync
//!
//! Synthesis facade and full-replace writer.
//!
//! Build a [`Synthesizer`] for a base directory, then call
//! [`Synthesizer::replace_configuration_files`] to regenerate `config/`, or
//! [`Synthesizer::diff_configuration_files`] to preview the change.

pub mod diff;
pub mod error;
pub mod pipeline;
pub mod writer;

pub use diff::{ChangeKind, DiffReport, FileChange};
pub use error::SyncError;
pub use pipeline::{Synthesis, Synthesizer};
