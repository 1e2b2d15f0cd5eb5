//! Log files: tail reading, line-count rotation and windowed search.
//!
//! Rotation keeps the trailing `maximum_lines` lines of a file in place
//! (no numbered backups) and relies on nginx reopening its handles
//! afterwards.

use std::collections::{BTreeSet, VecDeque};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Serialize;

use ignis_core::types::HostId;
use ignis_core::ModelSnapshot;
use ignis_core::source::DomainSource;
use ignis_core::store;
use ignis_renderer::{names, ConfigPaths};

use crate::error::{io_err, DaemonError};
use crate::scheduler::Task;
use crate::supervisor::Supervisor;

pub const DEFAULT_TAIL_LINES: usize = 50;
pub const MAX_TAIL_LINES: usize = 10_000;
pub const MAX_SEARCH_WINDOW: usize = 10;

// ---------------------------------------------------------------------------
// Tail
// ---------------------------------------------------------------------------

/// Last `lines` lines of `path`, oldest first. `lines` is clamped to
/// `[1, MAX_TAIL_LINES]`; a missing file reads as empty.
pub fn tail(path: &Path, lines: Option<usize>) -> Result<Vec<String>, DaemonError> {
    let limit = lines.unwrap_or(DEFAULT_TAIL_LINES).clamp(1, MAX_TAIL_LINES);
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path, e)),
    };
    trailing_lines(BufReader::new(file), limit).map_err(|e| io_err(path, e))
}

fn trailing_lines(reader: impl BufRead, limit: usize) -> io::Result<Vec<String>> {
    let mut window = VecDeque::with_capacity(limit.min(1024));
    for line in reader.split(b'\n') {
        if window.len() == limit {
            window.pop_front();
        }
        window.push_back(decode_line(&line?));
    }
    Ok(window.into())
}

/// Log lines may carry raw request bytes; invalid UTF-8 is replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Truncate `path` to its trailing `maximum_lines` lines when it holds at
/// least that many. Returns whether the file was rewritten.
pub fn rotate_file(path: &Path, maximum_lines: usize) -> io::Result<bool> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut total = 0usize;
    let mut kept: VecDeque<Vec<u8>> = VecDeque::new();
    for line in BufReader::new(file).split(b'\n') {
        let line = line?;
        total += 1;
        if kept.len() == maximum_lines {
            kept.pop_front();
        }
        if maximum_lines > 0 {
            kept.push_back(line);
        }
    }
    if total < maximum_lines {
        return Ok(false);
    }

    let mut contents = Vec::with_capacity(kept.iter().map(|l| l.len() + 1).sum());
    for line in kept {
        contents.extend_from_slice(&line);
        contents.push(b'\n');
    }
    std::fs::write(path, contents)?;
    Ok(true)
}

/// Main log plus the access and error logs of every host in `hosts`.
pub fn rotation_targets(paths: &ConfigPaths, hosts: &[HostId]) -> Vec<PathBuf> {
    let mut targets = vec![paths.main_log()];
    for host in hosts {
        targets.push(paths.log_file(&names::host_access_log(host)));
        targets.push(paths.log_file(&names::host_error_log(host)));
    }
    targets
}

/// Rotate every target; per-file failures are logged and skipped. Returns
/// the files that were rewritten.
pub fn rotate_logs(paths: &ConfigPaths, hosts: &[HostId], maximum_lines: usize) -> Vec<PathBuf> {
    let mut rotated = Vec::new();
    for path in rotation_targets(paths, hosts) {
        match rotate_file(&path, maximum_lines) {
            Ok(true) => {
                tracing::info!(path = %path.display(), "log file rotated");
                rotated.push(path);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "log rotation failed"),
        }
    }
    rotated
}

/// Scheduled rotation: rewrites the log files named by the current model,
/// then asks nginx to reopen them.
pub struct LogRotationTask {
    paths: ConfigPaths,
    model_path: PathBuf,
    supervisor: Arc<Supervisor>,
    in_progress: tokio::sync::Mutex<()>,
}

impl LogRotationTask {
    pub fn new(paths: ConfigPaths, model_path: PathBuf, supervisor: Arc<Supervisor>) -> Self {
        Self {
            paths,
            model_path,
            supervisor,
            in_progress: tokio::sync::Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Result<ModelSnapshot, DaemonError> {
        Ok(store::load_at(&self.model_path)?)
    }
}

#[async_trait]
impl Task for LogRotationTask {
    fn name(&self) -> &'static str {
        "log-rotation"
    }

    fn schedule(&self) -> Duration {
        let minutes = self
            .snapshot()
            .map(|s| s.settings.log_rotation.interval_minutes)
            .unwrap_or_else(|_| ignis_core::types::LogRotationSettings::default().interval_minutes);
        Duration::from_secs(minutes.max(1) * 60)
    }

    async fn on_schedule_started(&self) {
        tracing::info!(every = ?self.schedule(), "log rotation scheduled");
    }

    async fn run(&self) -> Result<(), DaemonError> {
        let Ok(_guard) = self.in_progress.try_lock() else {
            tracing::info!("log rotation already in progress, skipping");
            return Ok(());
        };
        let snapshot = self.snapshot()?;
        let rotation = snapshot.settings.log_rotation.clone();
        if !rotation.enabled {
            tracing::debug!("log rotation disabled");
            return Ok(());
        }
        let hosts: Vec<HostId> = snapshot.enabled_hosts()?.into_iter().map(|h| h.id).collect();

        let paths = self.paths.clone();
        let rotated = tokio::task::spawn_blocking(move || {
            rotate_logs(&paths, &hosts, rotation.maximum_lines)
        })
        .await
        .map_err(|e| DaemonError::Protocol(format!("rotation task join error: {e}")))?;

        tracing::info!(rotated = rotated.len(), "log rotation finished");
        if self.supervisor.is_running().await {
            self.supervisor.reopen_logs().await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Character offsets `[start, end)` of the match inside a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchLine {
    /// Zero-based index into the searched lines.
    pub index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
}

/// Filter `lines` by `query` and keep `window` lines of context (clamped
/// to `MAX_SEARCH_WINDOW`) around each match.
///
/// Query words must appear in order, case-insensitively, with anything in
/// between. An empty query returns every line unhighlighted.
pub fn search(lines: &[String], query: &str, window: usize) -> Result<Vec<SearchLine>, DaemonError> {
    let words: Vec<String> = query.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Ok(lines
            .iter()
            .enumerate()
            .map(|(index, text)| SearchLine {
                index,
                text: text.clone(),
                highlight: None,
            })
            .collect());
    }

    let pattern = RegexBuilder::new(&words.join(".*"))
        .case_insensitive(true)
        .build()?;
    let window = window.min(MAX_SEARCH_WINDOW);

    let mut highlights = Vec::new();
    let mut selected = BTreeSet::new();
    for (index, text) in lines.iter().enumerate() {
        if let Some(m) = pattern.find(text) {
            let start = text[..m.start()].chars().count();
            let end = start + m.as_str().chars().count();
            highlights.push((index, Highlight { start, end }));
            let last = (index + window).min(lines.len() - 1);
            selected.extend(index.saturating_sub(window)..=last);
        }
    }

    let mut highlights = highlights.into_iter().peekable();
    Ok(selected
        .into_iter()
        .map(|index| {
            let highlight = match highlights.peek() {
                Some((matched, h)) if *matched == index => {
                    let h = *h;
                    highlights.next();
                    Some(h)
                }
                _ => None,
            };
            SearchLine {
                index,
                text: lines[index].clone(),
                highlight,
            }
        })
        .collect())
}
