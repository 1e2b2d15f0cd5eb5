//! Dry-run unified diff support for `ignis diff`.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use similar::TextDiff;

use ignis_renderer::{ConfigPaths, ConfigurationFile};

use crate::error::{io_err, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One file that differs between the rendered tree and `config/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub name: String,
    pub kind: ChangeKind,
    /// Unified diff, or a one-line note for binary files.
    pub unified_diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub changes: Vec<FileChange>,
}

impl DiffReport {
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Compare `files` to the current contents of `config/`. No files are
/// written. Rendered files come first in render order, then removals in
/// name order.
pub fn diff_tree(paths: &ConfigPaths, files: &[ConfigurationFile]) -> Result<DiffReport, SyncError> {
    let config_dir = paths.config_dir();
    let mut on_disk = existing_names(&config_dir)?;
    let mut changes = Vec::new();

    for file in files {
        let path = config_dir.join(&file.name);
        let existed = on_disk.remove(&file.name);
        let current = if existed {
            std::fs::read(&path).map_err(|e| io_err(&path, e))?
        } else {
            Vec::new()
        };
        if existed && current == file.contents {
            continue;
        }
        let kind = if existed {
            ChangeKind::Changed
        } else {
            ChangeKind::Added
        };
        changes.push(FileChange {
            name: file.name.clone(),
            kind,
            unified_diff: unified(&file.name, &current, &file.contents),
        });
    }

    for name in on_disk {
        let path = config_dir.join(&name);
        let current = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        changes.push(FileChange {
            unified_diff: unified(&name, &current, &[]),
            name,
            kind: ChangeKind::Removed,
        });
    }

    Ok(DiffReport { changes })
}

fn existing_names(dir: &Path) -> Result<BTreeSet<String>, SyncError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        if entry.file_type().map_err(|e| io_err(entry.path(), e))?.is_file() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn unified(name: &str, old: &[u8], new: &[u8]) -> String {
    match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(old), Ok(new)) => TextDiff::from_lines(old, new)
            .unified_diff()
            .header(&format!("a/{name}"), &format!("b/{name}"))
            .context_radius(3)
            .to_string(),
        _ => format!("Binary files a/{name} and b/{name} differ\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_config_dir_reports_everything_added() {
        let tmp = TempDir::new().unwrap();
        let paths = ConfigPaths::new(tmp.path());
        let report = diff_tree(&paths, &[ConfigurationFile::text("nginx.conf", "a\n")]).unwrap();
        assert_eq!(report.count(ChangeKind::Added), 1);
        assert!(report.changes[0].unified_diff.contains("+a"));
    }

    #[test]
    fn binary_changes_are_summarised() {
        let tmp = TempDir::new().unwrap();
        let paths = ConfigPaths::new(tmp.path());
        fs::create_dir_all(paths.config_dir()).unwrap();
        fs::write(paths.config_file("db.mmdb"), [0u8, 255]).unwrap();

        let report =
            diff_tree(&paths, &[ConfigurationFile::binary("db.mmdb", vec![0, 254, 1])]).unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::Changed);
        assert_eq!(
            report.changes[0].unified_diff,
            "Binary files a/db.mmdb and b/db.mmdb differ\n"
        );
    }
}
