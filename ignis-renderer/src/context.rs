//! Synthesis context: the shared read-only payload every provider renders
//! from, plus the on-disk layout and file-name scheme.
//!
//! ```text
//! <base>/
//!   nginx.pid, nginx-stats.socket
//!   logs/     main.log, host-<id>.access.log, host-<id>.error.log
//!   config/   nginx.conf, mime.types, host-<id>.conf, stream-<id>.conf, ...
//!   cache/    cache-<id>/ (default proxy_cache_path storage), nginx-stats.dump
//! ```

use std::path::{Path, PathBuf};

use ignis_core::source::{DomainSource, IntegrationResolver};
use ignis_core::types::{
    AccessList, AccessListId, Cache, CacheId, Host, HostId, Settings, Stream, StreamId,
};
use ignis_core::ModelError;
use ignis_detector::SupportedFeatures;

use crate::engine::TemplateEngine;

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

/// File-name scheme of the generated `config/` tree.
pub mod names {
    use super::*;

    pub const MAIN_CONFIG: &str = "nginx.conf";
    pub const MIME_TYPES: &str = "mime.types";
    pub const GEOIP_DATABASE: &str = "GeoLite2-Country.mmdb";
    pub const PID_FILE: &str = "nginx.pid";
    pub const STATS_SOCKET: &str = "nginx-stats.socket";
    pub const STATS_DUMP: &str = "nginx-stats.dump";
    pub const MAIN_LOG: &str = "main.log";

    pub fn access_list_conf(id: &AccessListId) -> String {
        format!("access-list-{id}.conf")
    }

    pub fn access_list_htpasswd(id: &AccessListId) -> String {
        format!("access-list-{id}.htpasswd")
    }

    pub fn certificate(id: &ignis_core::CertificateId) -> String {
        format!("certificate-{id}.pem")
    }

    pub fn host(id: &HostId) -> String {
        format!("host-{id}.conf")
    }

    pub fn route_source(host: &HostId, priority: u32) -> String {
        format!("host-{host}-route-{priority}.js")
    }

    pub fn route_payload(host: &HostId, priority: u32) -> String {
        format!("host-{host}-route-{priority}.payload")
    }

    pub fn stream(id: &StreamId) -> String {
        format!("stream-{id}.conf")
    }

    pub fn host_access_log(id: &HostId) -> String {
        format!("host-{id}.access.log")
    }

    pub fn host_error_log(id: &HostId) -> String {
        format!("host-{id}.error.log")
    }

    pub fn default_cache_dir(id: &CacheId) -> String {
        format!("cache-{id}")
    }
}

// ---------------------------------------------------------------------------
// ConfigPaths
// ---------------------------------------------------------------------------

/// Resolved directory layout under one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    base: PathBuf,
}

impl ConfigPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base.join("config")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base.join("cache")
    }

    /// `<base>/config/<name>`
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// `<base>/logs/<name>`
    pub fn log_file(&self, name: &str) -> PathBuf {
        self.logs_dir().join(name)
    }

    pub fn main_config(&self) -> PathBuf {
        self.config_file(names::MAIN_CONFIG)
    }

    /// Runtime files live directly under the base directory because
    /// `config/` is wiped on every replace while nginx is running.
    pub fn pid_file(&self) -> PathBuf {
        self.base.join(names::PID_FILE)
    }

    pub fn stats_socket(&self) -> PathBuf {
        self.base.join(names::STATS_SOCKET)
    }

    pub fn stats_dump(&self) -> PathBuf {
        self.cache_dir().join(names::STATS_DUMP)
    }

    pub fn main_log(&self) -> PathBuf {
        self.log_file(names::MAIN_LOG)
    }
}

// ---------------------------------------------------------------------------
// Generated files
// ---------------------------------------------------------------------------

/// One file of the generated `config/` tree. Contents are bytes because the
/// GeoIP database is binary; every other file is UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl ConfigurationFile {
    pub fn text(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into().into_bytes(),
        }
    }

    pub fn binary(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }

    /// Contents as text; `None` for binary files.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }
}

// ---------------------------------------------------------------------------
// SynthesisContext
// ---------------------------------------------------------------------------

/// Everything one synthesis pass renders from. Entities are fetched once
/// up front so every provider sees the same snapshot.
pub struct SynthesisContext<'a> {
    pub paths: &'a ConfigPaths,
    pub features: &'a SupportedFeatures,
    pub templates: &'a TemplateEngine,
    pub settings: Settings,
    pub hosts: Vec<Host>,
    pub streams: Vec<Stream>,
    pub caches: Vec<Cache>,
    pub access_lists: Vec<AccessList>,
    /// Certificates are read lazily by id.
    pub source: &'a dyn DomainSource,
    pub integrations: &'a dyn IntegrationResolver,
}

impl<'a> SynthesisContext<'a> {
    /// Fetch every entity a pass needs from `source`.
    pub fn load(
        paths: &'a ConfigPaths,
        features: &'a SupportedFeatures,
        templates: &'a TemplateEngine,
        source: &'a dyn DomainSource,
        integrations: &'a dyn IntegrationResolver,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            paths,
            features,
            templates,
            settings: source.settings()?,
            hosts: source.enabled_hosts()?,
            streams: source.enabled_streams()?,
            caches: source.caches_in_use()?,
            access_lists: source.access_lists()?,
            source,
            integrations,
        })
    }

    pub fn cache(&self, id: &CacheId) -> Result<&Cache, ModelError> {
        self.caches
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| ModelError::NotFound {
                kind: "cache",
                id: id.0.clone(),
            })
    }

    pub fn access_list(&self, id: &AccessListId) -> Result<&AccessList, ModelError> {
        self.access_lists
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| ModelError::NotFound {
                kind: "access list",
                id: id.0.clone(),
            })
    }

    /// `<config>/<name>` rendered for use inside a directive.
    pub fn config_path(&self, name: &str) -> String {
        self.paths.config_file(name).display().to_string()
    }

    /// Stats tagging applies to `host` when stats are on globally and the
    /// host (or the global all-hosts flag) opts in.
    pub fn stats_enabled_for(&self, host: &Host) -> bool {
        let stats = &self.settings.stats;
        stats.enabled && (stats.all_hosts || host.feature_set.stats_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_base() {
        let paths = ConfigPaths::new("/srv/ignis");
        assert_eq!(paths.main_config(), PathBuf::from("/srv/ignis/config/nginx.conf"));
        assert_eq!(paths.main_log(), PathBuf::from("/srv/ignis/logs/main.log"));
        assert_eq!(paths.cache_dir(), PathBuf::from("/srv/ignis/cache"));
    }

    #[test]
    fn payload_and_source_names_share_the_route_key() {
        let host = HostId::from("blog");
        assert_eq!(names::route_payload(&host, 4), "host-blog-route-4.payload");
        assert_eq!(names::route_source(&host, 4), "host-blog-route-4.js");
    }

    #[test]
    fn binary_files_have_no_text_view() {
        let file = ConfigurationFile::binary("x.mmdb", vec![0xff, 0xfe, 0x00]);
        assert!(file.as_text().is_none());
        assert_eq!(ConfigurationFile::text("a", "b").as_text(), Some("b"));
    }
}
