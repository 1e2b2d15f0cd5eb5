//! Capability detection for `ignis-detector`.
//!
//! [`probe`] runs `<binary> -V` and parses the combined output into
//! [`Capabilities`]: version, build notes, TLS SNI support and the set of
//! compiled-in or loadable modules. [`Capabilities::supported_features`]
//! condenses that into the [`SupportedFeatures`] the renderer gates every
//! feature-specific directive on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How a server feature is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportType {
    /// Not available at all.
    #[default]
    None,
    /// Compiled into the binary.
    Static,
    /// Available as a loadable module (`load_module`).
    Dynamic,
}

impl SupportType {
    pub fn is_supported(self) -> bool {
        self != SupportType::None
    }
}

/// Feature gates consumed by the file providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFeatures {
    pub stream_type: SupportType,
    pub run_code_type: SupportType,
    pub tls_sni: SupportType,
    pub stats_type: SupportType,
    /// Directory dynamic modules are loaded from, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_path: Option<PathBuf>,
}

/// Everything learned from one `-V` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub version: Option<String>,
    /// All `built ...` lines, joined with `"; "`.
    pub build: Option<String>,
    pub tls_sni: bool,
    /// Module names in first-seen order, deduplicated.
    pub modules: Vec<String>,
    pub modules_path: Option<PathBuf>,
}

/// Errors from capability probing.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} -V did not finish within {timeout:?}")]
    Timeout { binary: PathBuf, timeout: Duration },

    #[error("{binary} -V failed: {output}")]
    Failed { binary: PathBuf, output: String },
}

// Module names that gate derived features.
const STREAM_STATIC: &str = "stream";
const STREAM_DYNAMIC: &str = "ngx_stream_module";
const JS_MODULE: &str = "ngx_http_js_module";
const LUA_MODULE: &str = "ngx_http_lua_module";
const NDK_MODULE: &str = "ndk_http_module";
const STATS_MARKERS: [&str; 2] = ["vhost_traffic_status", "nginx-module-vts"];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `<binary> -V` and parse its output.
///
/// The child is killed if `timeout` elapses or the returned future is
/// dropped. The modules directory named by `--modules-path` is listed
/// best-effort.
pub async fn probe(binary: &Path, timeout: Duration) -> Result<Capabilities, DetectError> {
    let child = tokio::process::Command::new(binary)
        .arg("-V")
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| DetectError::Timeout {
            binary: binary.to_path_buf(),
            timeout,
        })?
        .map_err(|e| DetectError::Spawn {
            binary: binary.to_path_buf(),
            source: e,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(DetectError::Failed {
            binary: binary.to_path_buf(),
            output: combined.trim().to_string(),
        });
    }

    let capabilities = Capabilities::from_output(&combined);
    tracing::debug!(
        binary = %binary.display(),
        version = capabilities.version.as_deref().unwrap_or("unknown"),
        modules = capabilities.modules.len(),
        "capabilities probed"
    );
    Ok(capabilities)
}

impl Capabilities {
    /// Parse `-V` output, then union in the `*.so` files found in the
    /// modules directory.
    pub fn from_output(output: &str) -> Self {
        let mut capabilities = parse_output(output);
        if let Some(dir) = capabilities.modules_path.clone() {
            let listed = list_module_dir(&dir);
            capabilities.modules = union_ordered(capabilities.modules, listed);
        }
        capabilities
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    pub fn tls_sni_type(&self) -> SupportType {
        if self.tls_sni {
            SupportType::Static
        } else {
            SupportType::None
        }
    }

    pub fn stream_type(&self) -> SupportType {
        if self.has_module(STREAM_STATIC) {
            SupportType::Static
        } else if self.has_module(STREAM_DYNAMIC) {
            SupportType::Dynamic
        } else {
            SupportType::None
        }
    }

    /// Code execution needs the JS, Lua and NDK modules together.
    pub fn run_code_type(&self) -> SupportType {
        if [JS_MODULE, LUA_MODULE, NDK_MODULE]
            .iter()
            .all(|m| self.has_module(m))
        {
            SupportType::Dynamic
        } else {
            SupportType::None
        }
    }

    pub fn stats_type(&self) -> SupportType {
        let present = self
            .modules
            .iter()
            .any(|m| STATS_MARKERS.iter().any(|marker| m.contains(marker)));
        if present {
            SupportType::Dynamic
        } else {
            SupportType::None
        }
    }

    pub fn supported_features(&self) -> SupportedFeatures {
        SupportedFeatures {
            stream_type: self.stream_type(),
            run_code_type: self.run_code_type(),
            tls_sni: self.tls_sni_type(),
            stats_type: self.stats_type(),
            modules_path: self.modules_path.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Parse `-V` output without touching the filesystem.
pub fn parse_output(output: &str) -> Capabilities {
    let mut version = None;
    let mut build_lines = Vec::new();
    let mut static_modules = Vec::new();
    let mut dynamic_modules = Vec::new();
    let mut modules_path = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("nginx version: nginx/") {
            version = Some(v.trim().to_string());
        } else if let Some(b) = line.strip_prefix("built ") {
            build_lines.push(b.trim().to_string());
        } else if let Some(args) = line.strip_prefix("configure arguments:") {
            for arg in split_arguments(args) {
                classify_argument(
                    &arg,
                    &mut static_modules,
                    &mut dynamic_modules,
                    &mut modules_path,
                );
            }
        }
    }

    Capabilities {
        version,
        build: (!build_lines.is_empty()).then(|| build_lines.join("; ")),
        tls_sni: output.contains("TLS SNI support enabled"),
        modules: union_ordered(static_modules, dynamic_modules),
        modules_path,
    }
}

fn classify_argument(
    arg: &str,
    static_modules: &mut Vec<String>,
    dynamic_modules: &mut Vec<String>,
    modules_path: &mut Option<PathBuf>,
) {
    if let Some(path) = arg.strip_prefix("--modules-path=") {
        *modules_path = Some(PathBuf::from(path));
    } else if let Some(path) = arg.strip_prefix("--add-dynamic-module=") {
        let base = Path::new(path.trim_end_matches('/'))
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if base.is_empty() {
            return;
        }
        let alias = strip_version_suffix(&base).to_string();
        dynamic_modules.push(base.clone());
        if alias != base {
            dynamic_modules.push(alias);
        }
    } else if let Some(rest) = arg.strip_prefix("--with-") {
        match rest.split_once('=') {
            Some((name, "dynamic")) if name.ends_with("_module") => {
                dynamic_modules.push(name.to_string());
                dynamic_modules.push(format!("ngx_{name}"));
            }
            Some((name, "dynamic")) => {
                dynamic_modules.push(format!("ngx_{name}_module"));
            }
            // `--with-cc-opt=...`, `--with-openssl=...` and similar carry
            // paths or flags, not modules.
            Some(_) => {}
            None => static_modules.push(rest.to_string()),
        }
    }
}

/// Split a configure-arguments string on whitespace, keeping quoted
/// segments (`--with-cc-opt='-g -O2'`) intact.
fn split_arguments(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in args.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// `nginx-module-vts-0.2.2` → `nginx-module-vts`, `njs-v0.8.1` → `njs`.
fn strip_version_suffix(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((head, tail)) => {
            let digits = tail.strip_prefix('v').unwrap_or(tail);
            let is_version = digits.starts_with(|c: char| c.is_ascii_digit())
                && digits.chars().all(|c| c.is_ascii_digit() || c == '.');
            if is_version && !head.is_empty() {
                head
            } else {
                name
            }
        }
        None => name,
    }
}

/// `*.so` basenames in `dir`. A missing or unreadable directory logs a
/// warning and yields nothing.
pub fn list_module_dir(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "cannot list modules directory");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("so") {
                return None;
            }
            path.file_stem().map(|s| s.to_string_lossy().into_owned())
        })
        .collect();
    // read_dir order is platform dependent
    names.sort();
    names
}

fn union_ordered(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_arguments_stay_whole() {
        let args = split_arguments(" --prefix=/etc/nginx --with-cc-opt='-g -O2 -fPIC' --with-stream");
        assert_eq!(
            args,
            vec!["--prefix=/etc/nginx", "--with-cc-opt=-g -O2 -fPIC", "--with-stream"]
        );
    }

    #[test]
    fn version_suffix_is_stripped() {
        assert_eq!(strip_version_suffix("nginx-module-vts-0.2.2"), "nginx-module-vts");
        assert_eq!(strip_version_suffix("njs-v0.8.1"), "njs");
        assert_eq!(strip_version_suffix("headers-more-nginx-module"), "headers-more-nginx-module");
        assert_eq!(strip_version_suffix("lua"), "lua");
    }

    #[test]
    fn union_keeps_first_seen_order() {
        let merged = union_ordered(
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into(), "a".into()],
        );
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn value_bearing_with_flags_are_not_modules() {
        let caps = parse_output("configure arguments: --with-openssl=/src/openssl --with-cc-opt='-O2'");
        assert!(caps.modules.is_empty());
    }
}
