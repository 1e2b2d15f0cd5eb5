//! File providers: independent generators that each turn the synthesis
//! context into zero or more configuration files.
//!
//! The facade runs [`default_providers`] in order and aborts the pass on
//! the first error.

mod access_list;
mod cache;
mod certificate;
pub mod geoip;
mod host;
mod main_config;
mod mime_types;
mod route_source;
mod static_response;
mod stream;

pub use access_list::AccessListProvider;
pub use cache::{cache_directives, cache_path_directive};
pub use certificate::HostCertificateProvider;
pub use geoip::{GeoIpProvider, HttpReleaseFetcher, Release, ReleaseFetcher};
pub use host::HostConfigurationProvider;
pub use main_config::MainConfigurationProvider;
pub use mime_types::MimeTypesProvider;
pub use route_source::HostRouteSourceCodeProvider;
pub use static_response::HostRouteStaticResponseProvider;
pub use stream::StreamProvider;

use crate::context::{ConfigurationFile, SynthesisContext};
use crate::error::RenderError;

/// A stateless generator of configuration files.
pub trait FileProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError>;
}

/// Every provider, in the order the facade runs them.
pub fn default_providers(geoip: GeoIpProvider) -> Vec<Box<dyn FileProvider>> {
    vec![
        Box::new(AccessListProvider),
        Box::new(HostCertificateProvider),
        Box::new(HostConfigurationProvider),
        Box::new(HostRouteSourceCodeProvider),
        Box::new(HostRouteStaticResponseProvider),
        Box::new(MainConfigurationProvider),
        Box::new(StreamProvider),
        Box::new(geoip),
        Box::new(MimeTypesProvider),
    ]
}
