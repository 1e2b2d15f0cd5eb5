//! Application configuration: the key-value settings the engine needs that
//! are not part of the domain model.
//!
//! Resolution order, later wins:
//! 1. built-in defaults (rooted at `~/.ignis/`)
//! 2. `~/.ignis/config.yaml` (or an explicit path)
//! 3. `IGNIS_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ModelError};

pub const CONFIG_FILE: &str = "config.yaml";
pub const MODEL_FILE: &str = "model.yaml";
pub const CONTROL_SOCKET: &str = "ignis.sock";

pub const ENV_NGINX_BINARY: &str = "IGNIS_NGINX_BINARY";
pub const ENV_CONFIG_ROOT: &str = "IGNIS_CONFIG_ROOT";
pub const ENV_MODEL_PATH: &str = "IGNIS_MODEL_PATH";
pub const ENV_GEOIP_CACHE_DIR: &str = "IGNIS_GEOIP_CACHE_DIR";

/// Default release metadata endpoint for the GeoLite2 country database.
pub const DEFAULT_GEOIP_RELEASE_URL: &str =
    "https://api.github.com/repos/P3TERX/GeoLite.mmdb/releases/latest";
pub const DEFAULT_GEOIP_ASSET: &str = "GeoLite2-Country.mmdb";

/// GeoIP database fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    pub cache_dir: PathBuf,
    pub release_url: String,
    pub asset_name: String,
    #[serde(with = "seconds")]
    pub metadata_timeout: Duration,
    #[serde(with = "seconds")]
    pub download_timeout: Duration,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            cache_dir: ignis_root_or_relative().join("geoip"),
            release_url: DEFAULT_GEOIP_RELEASE_URL.to_string(),
            asset_name: DEFAULT_GEOIP_ASSET.to_string(),
            metadata_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(60),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// nginx executable; resolved through `$PATH` when relative.
    pub nginx_binary: PathBuf,
    /// Base directory holding `logs/`, `config/` and `cache/`.
    pub config_root: PathBuf,
    /// YAML domain snapshot.
    pub model_path: PathBuf,
    /// Unix socket the daemon listens on for control requests.
    pub control_socket: PathBuf,
    #[serde(with = "seconds")]
    pub probe_timeout: Duration,
    pub geoip: GeoIpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let root = ignis_root_or_relative();
        Self {
            nginx_binary: PathBuf::from("nginx"),
            config_root: root.join("nginx"),
            model_path: root.join(MODEL_FILE),
            control_socket: root.join(CONTROL_SOCKET),
            probe_timeout: Duration::from_secs(5),
            geoip: GeoIpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `~/.ignis/config.yaml` plus environment overrides.
    pub fn load() -> Result<Self, ModelError> {
        let home = dirs::home_dir().ok_or(ModelError::HomeNotFound)?;
        Self::load_from(&ignis_root(&home).join(CONFIG_FILE))
    }

    /// Load from an explicit file (absent file means defaults) plus
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ModelError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            serde_yaml::from_str(&contents).map_err(|e| ModelError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            AppConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `IGNIS_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ModelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &'static str| -> Result<Option<PathBuf>, ModelError> {
            match lookup(key) {
                None => Ok(None),
                Some(value) if value.trim().is_empty() => Err(ModelError::InvalidOverride {
                    key,
                    message: "must not be empty".to_string(),
                }),
                Some(value) => Ok(Some(PathBuf::from(value))),
            }
        };

        if let Some(v) = non_empty(ENV_NGINX_BINARY)? {
            self.nginx_binary = v;
        }
        if let Some(v) = non_empty(ENV_CONFIG_ROOT)? {
            self.config_root = v;
        }
        if let Some(v) = non_empty(ENV_MODEL_PATH)? {
            self.model_path = v;
        }
        if let Some(v) = non_empty(ENV_GEOIP_CACHE_DIR)? {
            self.geoip.cache_dir = v;
        }
        Ok(())
    }
}

/// `<home>/.ignis`
pub fn ignis_root(home: &Path) -> PathBuf {
    home.join(".ignis")
}

fn ignis_root_or_relative() -> PathBuf {
    dirs::home_dir()
        .map(|home| ignis_root(&home))
        .unwrap_or_else(|| PathBuf::from(".ignis"))
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
