//! # ignis-renderer
//!
//! Turns a domain snapshot into the nginx configuration tree. Each
//! [`FileProvider`] renders one concern (hosts, streams, access lists, ...)
//! from a shared [`SynthesisContext`]; Tera templates hold the block layout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ignis_core::ModelSnapshot;
//! use ignis_detector::SupportedFeatures;
//! use ignis_renderer::{default_providers, ConfigPaths, GeoIpProvider, SynthesisContext, TemplateEngine};
//!
//! fn render(model: &ModelSnapshot, features: &SupportedFeatures) -> Result<(), ignis_renderer::RenderError> {
//!     let paths = ConfigPaths::new("/var/lib/ignis");
//!     let engine = TemplateEngine::new()?;
//!     let ctx = SynthesisContext::load(&paths, features, &engine, model, model)?;
//!     for provider in default_providers(GeoIpProvider::http(Default::default())) {
//!         for file in provider.provide(&ctx)? {
//!             println!("{}: {} bytes", file.name, file.contents.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod htpasswd;
pub mod providers;

pub use context::{names, ConfigPaths, ConfigurationFile, SynthesisContext};
pub use engine::TemplateEngine;
pub use error::RenderError;
pub use providers::{default_providers, FileProvider, GeoIpProvider};
