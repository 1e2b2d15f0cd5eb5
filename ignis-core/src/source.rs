//! Collaborator contracts consumed by the synthesis engine.
//!
//! The engine never owns persistence. It reads everything through
//! [`DomainSource`] and resolves integration targets through
//! [`IntegrationResolver`]; both are implemented by [`crate::store::ModelSnapshot`]
//! for the YAML-backed deployment and by fakes in tests.

use crate::error::ModelError;
use crate::types::{
    AccessList, Cache, Certificate, CertificateId, Host, IntegrationId, Settings, Stream,
};

/// Read accessors for every entity a synthesis pass needs.
pub trait DomainSource: Send + Sync {
    /// Hosts with `enabled == true`.
    fn enabled_hosts(&self) -> Result<Vec<Host>, ModelError>;

    /// Streams with `enabled == true`.
    fn enabled_streams(&self) -> Result<Vec<Stream>, ModelError>;

    /// Caches referenced by at least one enabled host or enabled route.
    fn caches_in_use(&self) -> Result<Vec<Cache>, ModelError>;

    /// Every access list.
    fn access_lists(&self) -> Result<Vec<AccessList>, ModelError>;

    /// Certificate by id; [`ModelError::NotFound`] when absent.
    fn certificate(&self, id: &CertificateId) -> Result<Certificate, ModelError>;

    /// Global settings.
    fn settings(&self) -> Result<Settings, ModelError>;
}

/// Target of an integration option, resolved at generation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOption {
    pub url: Option<String>,
    pub dns_resolvers: Vec<String>,
}

/// Resolves `(integration, option)` pairs to concrete upstream URLs.
pub trait IntegrationResolver: Send + Sync {
    fn option_url(
        &self,
        integration: &IntegrationId,
        option_id: &str,
    ) -> Result<ResolvedOption, ModelError>;
}
