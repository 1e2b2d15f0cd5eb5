//! Full-replace writer for the generated tree.
//!
//! ## Replace protocol
//!
//! 1. Ensure `logs/`, `config/` and `cache/` exist under the base dir.
//! 2. Delete every entry directly under `config/`.
//! 3. Write each file verbatim under `config/`.
//!
//! `logs/` and `cache/` are never touched.

use std::path::Path;

use ignis_renderer::{ConfigPaths, ConfigurationFile};

use crate::error::{io_err, SyncError};

/// Create the three top-level directories if they are missing.
pub fn ensure_layout(paths: &ConfigPaths) -> Result<(), SyncError> {
    for dir in [paths.logs_dir(), paths.config_dir(), paths.cache_dir()] {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    Ok(())
}

/// Remove every file and directory inside `dir`, keeping `dir` itself.
fn clear_dir(dir: &Path) -> Result<usize, SyncError> {
    let mut removed = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Replace the contents of `config/` with `files`.
pub fn replace_tree(paths: &ConfigPaths, files: &[ConfigurationFile]) -> Result<(), SyncError> {
    ensure_layout(paths)?;

    let config_dir = paths.config_dir();
    let removed = clear_dir(&config_dir)?;
    tracing::debug!(dir = %config_dir.display(), removed, "cleared configuration directory");

    for file in files {
        let path = config_dir.join(&file.name);
        std::fs::write(&path, &file.contents).map_err(|e| io_err(&path, e))?;
    }

    tracing::info!(dir = %config_dir.display(), files = files.len(), "configuration replaced");
    Ok(())
}
