//! YAML-backed domain snapshot.
//!
//! # Storage layout
//!
//! ```text
//! <model_path>            (default ~/.ignis/model.yaml)
//!   settings:      global settings, bindings, stats, rotation
//!   hosts:         [Host]
//!   streams:       [Stream]
//!   caches:        [Cache]
//!   access_lists:  [AccessList]
//!   certificates:  [Certificate]
//!   integrations:  [{ id, options: [{ id, url, dns_resolvers }] }]
//! ```
//!
//! A [`ModelSnapshot`] is loaded once per synthesis pass so every provider
//! sees the same consistent view. Saves use the `.tmp` + rename pattern.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ModelError};
use crate::source::{DomainSource, IntegrationResolver, ResolvedOption};
use crate::types::{
    AccessList, Cache, CacheId, Certificate, CertificateId, Host, IntegrationId, Settings, Stream,
};

/// One resolvable option exposed by an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub dns_resolvers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    #[serde(default)]
    pub options: Vec<IntegrationOption>,
}

/// The whole domain model as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSnapshot {
    pub settings: Settings,
    pub hosts: Vec<Host>,
    pub streams: Vec<Stream>,
    pub caches: Vec<Cache>,
    pub access_lists: Vec<AccessList>,
    pub certificates: Vec<Certificate>,
    pub integrations: Vec<Integration>,
}

impl DomainSource for ModelSnapshot {
    fn enabled_hosts(&self) -> Result<Vec<Host>, ModelError> {
        Ok(self.hosts.iter().filter(|h| h.enabled).cloned().collect())
    }

    fn enabled_streams(&self) -> Result<Vec<Stream>, ModelError> {
        Ok(self.streams.iter().filter(|s| s.enabled).cloned().collect())
    }

    fn caches_in_use(&self) -> Result<Vec<Cache>, ModelError> {
        let mut used: BTreeSet<&CacheId> = BTreeSet::new();
        for host in self.hosts.iter().filter(|h| h.enabled) {
            used.extend(host.cache_id.iter());
            for route in host.routes.iter().filter(|r| r.enabled) {
                used.extend(route.cache_id.iter());
            }
        }
        Ok(self
            .caches
            .iter()
            .filter(|c| used.contains(&c.id))
            .cloned()
            .collect())
    }

    fn access_lists(&self) -> Result<Vec<AccessList>, ModelError> {
        Ok(self.access_lists.clone())
    }

    fn certificate(&self, id: &CertificateId) -> Result<Certificate, ModelError> {
        self.certificates
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound {
                kind: "certificate",
                id: id.0.clone(),
            })
    }

    fn settings(&self) -> Result<Settings, ModelError> {
        Ok(self.settings.clone())
    }
}

impl IntegrationResolver for ModelSnapshot {
    fn option_url(
        &self,
        integration: &IntegrationId,
        option_id: &str,
    ) -> Result<ResolvedOption, ModelError> {
        let found = self
            .integrations
            .iter()
            .find(|i| &i.id == integration)
            .ok_or_else(|| ModelError::NotFound {
                kind: "integration",
                id: integration.0.clone(),
            })?;
        let option = found
            .options
            .iter()
            .find(|o| o.id == option_id)
            .ok_or_else(|| ModelError::NotFound {
                kind: "integration option",
                id: format!("{}/{option_id}", integration.0),
            })?;
        Ok(ResolvedOption {
            url: option.url.clone(),
            dns_resolvers: option.dns_resolvers.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the snapshot at `path`.
///
/// A missing file yields an empty model with default settings, so a fresh
/// install can start nginx with just the main configuration.
pub fn load_at(path: &Path) -> Result<ModelSnapshot, ModelError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "model file absent, using empty model");
        return Ok(ModelSnapshot::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Atomically save `snapshot` to `path` (`.tmp` sibling, then rename).
pub fn save_at(path: &Path, snapshot: &ModelSnapshot) -> Result<(), ModelError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    let yaml = serde_yaml::to_string(snapshot)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ModelError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ModelError> {
    Ok(())
}
