//! GeoLite2 country database, fetched from a GitHub-style release feed and
//! cached on disk.
//!
//! Fallback order when stats are enabled:
//! 1. release tag matches the cached version marker → cached bytes
//! 2. otherwise download the asset, persist data + marker → fresh bytes
//! 3. any remote failure with a cache present → cached bytes (warning)
//! 4. remote failure and no cache → [`RenderError::GeoIpUnavailable`]

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use ignis_core::GeoIpConfig;

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::error::{io_err, RenderError};

use super::FileProvider;

const VERSION_MARKER: &str = "version";
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Latest published release of the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub asset_url: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("release has no asset named {0}")]
    MissingAsset(String),

    #[error("malformed release metadata: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
}

/// Remote side of the GeoIP provider.
pub trait ReleaseFetcher: Send + Sync {
    fn latest_release(
        &self,
        url: &str,
        asset_name: &str,
        timeout: Duration,
    ) -> Result<Release, FetchError>;

    fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

/// [`ReleaseFetcher`] backed by `ureq` against the GitHub releases API.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpReleaseFetcher;

impl HttpReleaseFetcher {
    fn agent(timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(timeout).build()
    }
}

impl ReleaseFetcher for HttpReleaseFetcher {
    fn latest_release(
        &self,
        url: &str,
        asset_name: &str,
        timeout: Duration,
    ) -> Result<Release, FetchError> {
        let body = Self::agent(timeout)
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", concat!("ignis/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| FetchError::Http(e.to_string()))?
            .into_string()?;
        let release: GithubRelease = serde_json::from_str(&body)?;
        let asset = release
            .assets
            .into_iter()
            .find(|a| a.name == asset_name)
            .ok_or_else(|| FetchError::MissingAsset(asset_name.to_string()))?;
        Ok(Release {
            tag: release.tag_name,
            asset_url: asset.browser_download_url,
        })
    }

    fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let response = Self::agent(timeout)
            .get(url)
            .set("User-Agent", concat!("ignis/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_DOWNLOAD_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Emits `GeoLite2-Country.mmdb` when stats are enabled.
pub struct GeoIpProvider {
    config: GeoIpConfig,
    fetcher: Box<dyn ReleaseFetcher>,
}

impl GeoIpProvider {
    pub fn new(config: GeoIpConfig, fetcher: Box<dyn ReleaseFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Provider using the real HTTP fetcher.
    pub fn http(config: GeoIpConfig) -> Self {
        Self::new(config, Box::new(HttpReleaseFetcher))
    }

    fn data_path(&self) -> PathBuf {
        self.config.cache_dir.join(&self.config.asset_name)
    }

    fn version_path(&self) -> PathBuf {
        self.config.cache_dir.join(VERSION_MARKER)
    }

    fn cached(&self) -> (Option<String>, Option<Vec<u8>>) {
        let version = std::fs::read_to_string(self.version_path())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let data_path = self.data_path();
        let data = match std::fs::read(&data_path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %data_path.display(), error = %e, "unreadable GeoIP cache");
                None
            }
        };
        (version, data)
    }

    fn persist(&self, tag: &str, data: &[u8]) -> Result<(), RenderError> {
        let dir = &self.config.cache_dir;
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let data_path = self.data_path();
        std::fs::write(&data_path, data).map_err(|e| io_err(&data_path, e))?;
        let version_path = self.version_path();
        std::fs::write(&version_path, tag).map_err(|e| io_err(&version_path, e))?;
        Ok(())
    }

    /// Resolve the database bytes following the fallback order above.
    pub fn database(&self) -> Result<Vec<u8>, RenderError> {
        let (cached_version, cached_data) = self.cached();

        let release = match self.fetcher.latest_release(
            &self.config.release_url,
            &self.config.asset_name,
            self.config.metadata_timeout,
        ) {
            Ok(release) => release,
            Err(e) => return fall_back(cached_data, "release metadata", e),
        };

        if let Some(data) = &cached_data {
            if cached_version.as_deref() == Some(release.tag.as_str()) {
                tracing::debug!(tag = %release.tag, "GeoIP cache is current");
                return Ok(data.clone());
            }
        }

        let data = match self
            .fetcher
            .download(&release.asset_url, self.config.download_timeout)
        {
            Ok(data) => data,
            Err(e) => return fall_back(cached_data, "database download", e),
        };

        if let Err(e) = self.persist(&release.tag, &data) {
            tracing::warn!(error = %e, "failed to cache GeoIP database");
        } else {
            tracing::info!(tag = %release.tag, bytes = data.len(), "GeoIP database updated");
        }
        Ok(data)
    }
}

fn fall_back(
    cached: Option<Vec<u8>>,
    stage: &str,
    error: FetchError,
) -> Result<Vec<u8>, RenderError> {
    match cached {
        Some(data) => {
            tracing::warn!(stage, error = %error, "GeoIP fetch failed, using cached database");
            Ok(data)
        }
        None => Err(RenderError::GeoIpUnavailable(format!("{stage}: {error}"))),
    }
}

impl FileProvider for GeoIpProvider {
    fn name(&self) -> &'static str {
        "geoip"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        if !ctx.settings.stats.enabled {
            return Ok(Vec::new());
        }
        let data = self.database()?;
        Ok(vec![ConfigurationFile::binary(names::GEOIP_DATABASE, data)])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
