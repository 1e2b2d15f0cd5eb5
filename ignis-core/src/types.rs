//! Domain types for the ignis control plane.
//!
//! Every entity here is a read-only snapshot: the synthesis engine fetches
//! them fresh at the start of each pass and never mutates them. All types
//! are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

id_newtype!(
    /// Identifier of a virtual host.
    HostId
);
id_newtype!(
    /// Identifier of a route inside a host.
    RouteId
);
id_newtype!(
    /// Identifier of a stream listener.
    StreamId
);
id_newtype!(
    /// Identifier of a cache configuration.
    CacheId
);
id_newtype!(
    /// Identifier of an access list.
    AccessListId
);
id_newtype!(
    /// Identifier of a stored certificate.
    CertificateId
);
id_newtype!(
    /// Identifier of an external integration (e.g. a container platform).
    IntegrationId
);

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Protocol a host binding listens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingType {
    Http,
    Https,
}

/// An address/port pair a host listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: BindingType,
    pub ip: String,
    pub port: u16,
    /// Required iff `kind` is [`BindingType::Https`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<CertificateId>,
}

// ---------------------------------------------------------------------------
// Hosts and routes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostFeatureSet {
    pub websocket_support: bool,
    pub http2_support: bool,
    pub redirect_http_to_https: bool,
    pub stats_enabled: bool,
}

/// A virtual host: one `host-<id>.conf` with one `server {}` per binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub default_server: bool,
    #[serde(default)]
    pub use_global_bindings: bool,
    #[serde(default)]
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Opaque VPN references; tunnels are managed elsewhere.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpns: Vec<String>,
    #[serde(default)]
    pub feature_set: HostFeatureSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list_id: Option<AccessListId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_id: Option<CacheId>,
}

impl Host {
    /// Bindings this host actually listens on: its own, or the global set
    /// when `use_global_bindings` is set.
    pub fn effective_bindings<'a>(&'a self, global: &'a [Binding]) -> &'a [Binding] {
        if self.use_global_bindings {
            global
        } else {
            &self.bindings
        }
    }

    /// Enabled routes ordered by priority.
    pub fn enabled_routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.iter().filter(|r| r.enabled).collect();
        routes.sort_by_key(|r| r.priority);
        routes
    }
}

/// What a route does with a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Proxy,
    Redirect,
    StaticResponse,
    Integration,
    ExecuteCode,
    StaticFiles,
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteType::Proxy => write!(f, "proxy"),
            RouteType::Redirect => write!(f, "redirect"),
            RouteType::StaticResponse => write!(f, "static_response"),
            RouteType::Integration => write!(f, "integration"),
            RouteType::ExecuteCode => write!(f, "execute_code"),
            RouteType::StaticFiles => write!(f, "static_files"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub include_forward_headers: bool,
    pub proxy_ssl_server_name: bool,
    pub keep_original_domain_name: bool,
    pub directory_listing_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// A single response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Payload of a [`RouteType::StaticResponse`] route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Payload of a [`RouteType::Integration`] route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRef {
    pub integration_id: IntegrationId,
    pub option_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Javascript,
    Lua,
}

/// Payload of a [`RouteType::ExecuteCode`] route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCode {
    pub language: CodeLanguage,
    pub code: String,
    /// Exported function invoked by `js_content`; JavaScript only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub priority: u32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: RouteType,
    pub source_path: String,
    #[serde(default)]
    pub settings: RouteSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<StaticResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<SourceCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list_id: Option<AccessListId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_id: Option<CacheId>,
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDuration {
    /// Empty means every status (`any`).
    #[serde(default)]
    pub status_codes: Vec<String>,
    pub valid_time_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyLock {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
}

/// A proxy cache zone and the rules applied wherever it is referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    pub id: CacheId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size_mb: Option<u64>,
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    #[serde(default = "one")]
    pub minimum_uses_before_caching: u32,
    #[serde(default)]
    pub use_stale: Vec<String>,
    #[serde(default)]
    pub background_update: bool,
    #[serde(default)]
    pub revalidate: bool,
    #[serde(default)]
    pub concurrency_lock: ConcurrencyLock,
    #[serde(default)]
    pub bypass_rules: Vec<String>,
    #[serde(default)]
    pub no_cache_rules: Vec<String>,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub durations: Vec<CacheDuration>,
}

impl Cache {
    /// Shared memory zone name used by `proxy_cache` and `proxy_cache_path`.
    pub fn zone_name(&self) -> String {
        format!("cache_{}", nginx_identifier(&self.id.0))
    }
}

/// nginx variable, zone and upstream names allow `[A-Za-z0-9_]` only.
pub fn nginx_identifier(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Access lists
// ---------------------------------------------------------------------------

/// Outcome of an access list entry. Closed on purpose: unknown values are
/// rejected when the model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOutcome {
    Allow,
    Deny,
}

impl AccessOutcome {
    pub fn directive(self) -> &'static str {
        match self {
            AccessOutcome::Allow => "allow",
            AccessOutcome::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    pub outcome: AccessOutcome,
    pub source_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    pub id: AccessListId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entries: Vec<AccessListEntry>,
    pub default_outcome: AccessOutcome,
    #[serde(default)]
    pub satisfy_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default)]
    pub credentials: Vec<Credentials>,
    #[serde(default)]
    pub forward_authentication_header: bool,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Stored certificate material. Each field may be raw base64 DER or an
/// already PEM-wrapped block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub public_key: String,
    pub private_key: String,
    #[serde(default)]
    pub certification_chain: Vec<String>,
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    Tcp,
    Udp,
    Socket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAddress {
    pub protocol: StreamProtocol,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub max_failures: u32,
    pub open_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBackend {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreaker>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRoute {
    pub domain_names: Vec<String>,
    pub backends: Vec<StreamBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Simple,
    SniRouter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamFeatureSet {
    pub use_proxy_protocol: bool,
    pub socket_keep_alive: bool,
    pub tcp_keep_alive: bool,
    pub tcp_no_delay: bool,
    pub tcp_deferred: bool,
}

/// A layer-4 listener rendered into `stream-<id>.conf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub binding: StreamAddress,
    #[serde(rename = "type")]
    pub kind: StreamType,
    pub default_backend: StreamBackend,
    #[serde(default)]
    pub routes: Vec<StreamRoute>,
    #[serde(default)]
    pub feature_set: StreamFeatureSet,
}

// ---------------------------------------------------------------------------
// Global settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    #[default]
    Warn,
    Error,
    Crit,
    Alert,
    Emerg,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Crit => "crit",
            LogLevel::Alert => "alert",
            LogLevel::Emerg => "emerg",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub server_logs_enabled: bool,
    pub server_logs_level: LogLevel,
    pub access_logs_enabled: bool,
    pub error_logs_enabled: bool,
    pub error_logs_level: LogLevel,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            server_logs_enabled: true,
            server_logs_level: LogLevel::Error,
            access_logs_enabled: true,
            error_logs_enabled: true,
            error_logs_level: LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub read: u32,
    pub connect: u32,
    pub send: u32,
    pub keepalive: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: 300,
            connect: 5,
            send: 300,
            keepalive: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSize {
    pub amount: u32,
    pub size_kb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buffers {
    pub client_body_kb: u32,
    pub client_header_kb: u32,
    pub large_client_header: BufferSize,
    pub output: BufferSize,
}

impl Default for Buffers {
    fn default() -> Self {
        Self {
            client_body_kb: 16,
            client_header_kb: 1,
            large_client_header: BufferSize {
                amount: 4,
                size_kb: 8,
            },
            output: BufferSize {
                amount: 1,
                size_kb: 32,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_user: Option<String>,
    pub worker_processes: u32,
    pub worker_connections: u32,
    pub default_content_type: String,
    pub server_tokens: bool,
    pub sendfile: bool,
    pub tcp_no_delay: bool,
    pub gzip: bool,
    pub maximum_body_size_mb: u32,
    pub timeouts: Timeouts,
    pub buffers: Buffers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    pub logs: LogSettings,
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            runtime_user: None,
            worker_processes: 2,
            worker_connections: 1024,
            default_content_type: "application/octet-stream".to_string(),
            server_tokens: false,
            sendfile: true,
            tcp_no_delay: true,
            gzip: true,
            maximum_body_size_mb: 1024,
            timeouts: Timeouts::default(),
            buffers: Buffers::default(),
            custom: None,
            logs: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRotationSettings {
    pub enabled: bool,
    pub maximum_lines: usize,
    pub interval_minutes: u64,
}

impl Default for LogRotationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_lines: 10_000,
            interval_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    pub enabled: bool,
    /// Tag every host, regardless of its own `stats_enabled` flag.
    pub all_hosts: bool,
    /// Persist counters across restarts via a dump file.
    pub persistent: bool,
    pub maximum_size_mb: u32,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            all_hosts: false,
            persistent: false,
            maximum_size_mb: 16,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub nginx: NginxSettings,
    pub log_rotation: LogRotationSettings,
    pub global_bindings: Vec<Binding>,
    pub stats: StatsSettings,
}

fn enabled_by_default() -> bool {
    true
}

fn one() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(port: u16) -> Binding {
        Binding {
            kind: BindingType::Http,
            ip: "0.0.0.0".into(),
            port,
            certificate_id: None,
        }
    }

    fn host(use_global: bool) -> Host {
        Host {
            id: HostId::from("h1"),
            enabled: true,
            default_server: false,
            use_global_bindings: use_global,
            domain_names: vec![],
            routes: vec![],
            bindings: vec![binding(8080)],
            vpns: vec![],
            feature_set: HostFeatureSet::default(),
            access_list_id: None,
            cache_id: None,
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(HostId::from("foo").to_string(), "foo");
        assert_eq!(CertificateId::from(String::from("c-1")).to_string(), "c-1");
    }

    #[test]
    fn global_bindings_replace_own_bindings() {
        let global = vec![binding(80), binding(443)];
        let h = host(true);
        let effective = h.effective_bindings(&global);
        assert_eq!(effective.len(), 2);
        assert!(effective.iter().all(|b| b.port != 8080));
    }

    #[test]
    fn own_bindings_used_without_global_flag() {
        let global = vec![binding(80)];
        let h = host(false);
        assert_eq!(h.effective_bindings(&global)[0].port, 8080);
    }

    #[test]
    fn cache_zone_name_is_identifier_safe() {
        let cache: Cache = serde_yaml::from_str("id: a-b-c\n").expect("cache");
        assert_eq!(cache.zone_name(), "cache_a_b_c");
        assert_eq!(cache.minimum_uses_before_caching, 1);

        let cache: Cache = serde_yaml::from_str("id: static/v1.2\n").expect("cache");
        assert_eq!(cache.zone_name(), "cache_static_v1_2");
    }

    #[test]
    fn unknown_access_outcome_is_rejected() {
        let yaml = "id: acl\ndefault_outcome: maybe\n";
        assert!(serde_yaml::from_str::<AccessList>(yaml).is_err());
    }

    #[test]
    fn log_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Emerg.to_string(), "emerg");
    }
}
