//! Synthesis facade: one entrypoint shared by the CLI and the daemon.
//!
//! A pass fetches every entity once, runs the providers in their fixed
//! order against the same context and concatenates their output. The first
//! provider error aborts the pass; nothing is written until every provider
//! has succeeded.

use ignis_core::source::{DomainSource, IntegrationResolver};
use ignis_core::types::{Host, Stream};
use ignis_detector::SupportedFeatures;
use ignis_renderer::{
    default_providers, ConfigPaths, ConfigurationFile, FileProvider, GeoIpProvider,
    SynthesisContext, TemplateEngine,
};

use crate::diff::{diff_tree, DiffReport};
use crate::error::SyncError;
use crate::writer::replace_tree;

/// Output of one synthesis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub files: Vec<ConfigurationFile>,
    /// Enabled hosts the pass rendered; log rotation walks their log files.
    pub hosts: Vec<Host>,
    pub streams: Vec<Stream>,
}

/// Owns the template engine and provider list for one base directory.
pub struct Synthesizer {
    paths: ConfigPaths,
    templates: TemplateEngine,
    providers: Vec<Box<dyn FileProvider>>,
}

impl Synthesizer {
    /// Synthesizer running the standard provider list.
    pub fn new(paths: ConfigPaths, geoip: GeoIpProvider) -> Result<Self, SyncError> {
        Self::with_providers(paths, default_providers(geoip))
    }

    /// Synthesizer running `providers`, in order.
    pub fn with_providers(
        paths: ConfigPaths,
        providers: Vec<Box<dyn FileProvider>>,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            paths,
            templates: TemplateEngine::new()?,
            providers,
        })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Render the full configuration tree in memory.
    pub fn get_configuration_files(
        &self,
        features: &SupportedFeatures,
        source: &dyn DomainSource,
        integrations: &dyn IntegrationResolver,
    ) -> Result<Synthesis, SyncError> {
        let ctx = SynthesisContext::load(
            &self.paths,
            features,
            &self.templates,
            source,
            integrations,
        )?;

        let mut files = Vec::new();
        for provider in &self.providers {
            let provided = provider.provide(&ctx).map_err(|e| {
                tracing::error!(provider = provider.name(), error = %e, "provider failed");
                e
            })?;
            tracing::debug!(provider = provider.name(), files = provided.len(), "provider done");
            files.extend(provided);
        }

        tracing::info!(
            files = files.len(),
            hosts = ctx.hosts.len(),
            streams = ctx.streams.len(),
            "configuration synthesized"
        );
        Ok(Synthesis {
            files,
            hosts: ctx.hosts,
            streams: ctx.streams,
        })
    }

    /// Render the tree and replace `config/` with it.
    ///
    /// Not transactional: a failure half-way through the write leaves a
    /// partial tree, and the caller must retry before starting or reloading
    /// nginx.
    pub fn replace_configuration_files(
        &self,
        features: &SupportedFeatures,
        source: &dyn DomainSource,
        integrations: &dyn IntegrationResolver,
    ) -> Result<Synthesis, SyncError> {
        let synthesis = self.get_configuration_files(features, source, integrations)?;
        replace_tree(&self.paths, &synthesis.files)?;
        Ok(synthesis)
    }

    /// Render the tree and compare it with what is currently on disk.
    pub fn diff_configuration_files(
        &self,
        features: &SupportedFeatures,
        source: &dyn DomainSource,
        integrations: &dyn IntegrationResolver,
    ) -> Result<DiffReport, SyncError> {
        let synthesis = self.get_configuration_files(features, source, integrations)?;
        diff_tree(&self.paths, &synthesis.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_core::ModelSnapshot;
    use ignis_renderer::RenderError;

    struct Fixed(&'static str);

    impl FileProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn provide(&self, _: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
            Ok(vec![ConfigurationFile::text(self.0, self.0)])
        }
    }

    struct Failing;

    impl FileProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn provide(&self, _: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
            Err(RenderError::Unsupported {
                feature: "test",
                subject: "always".to_string(),
            })
        }
    }

    #[test]
    fn output_follows_provider_order() {
        let synthesizer = Synthesizer::with_providers(
            ConfigPaths::new("/srv/ignis"),
            vec![Box::new(Fixed("b")), Box::new(Fixed("a")), Box::new(Fixed("c"))],
        )
        .unwrap();
        let model = ModelSnapshot::default();
        let synthesis = synthesizer
            .get_configuration_files(&SupportedFeatures::default(), &model, &model)
            .unwrap();
        let names: Vec<&str> = synthesis.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn one_failing_provider_aborts_the_pass() {
        let synthesizer = Synthesizer::with_providers(
            ConfigPaths::new("/srv/ignis"),
            vec![Box::new(Fixed("a")), Box::new(Failing), Box::new(Fixed("c"))],
        )
        .unwrap();
        let model = ModelSnapshot::default();
        let err = synthesizer
            .get_configuration_files(&SupportedFeatures::default(), &model, &model)
            .unwrap_err();
        assert!(matches!(err, SyncError::Render(RenderError::Unsupported { .. })));
    }
}
