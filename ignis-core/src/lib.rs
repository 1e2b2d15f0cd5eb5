//! ignis core library: domain types, collaborator contracts, YAML snapshot
//! store and application configuration.
//!
//! - [`types`]: newtypes and domain structs
//! - [`source`]: [`DomainSource`] / [`IntegrationResolver`] contracts
//! - [`store`]: YAML-backed [`ModelSnapshot`]
//! - [`config`]: [`AppConfig`]
//! - [`error`]: [`ModelError`]

pub mod config;
pub mod error;
pub mod source;
pub mod store;
pub mod types;

pub use config::{AppConfig, GeoIpConfig};
pub use error::ModelError;
pub use source::{DomainSource, IntegrationResolver, ResolvedOption};
pub use store::ModelSnapshot;
pub use types::{
    AccessList, AccessListId, Binding, BindingType, Cache, CacheId, Certificate, CertificateId,
    Host, HostId, Route, RouteId, RouteType, Settings, Stream, StreamId, StreamType,
};
