pub mod apply;
pub mod daemon;
pub mod detect;
pub mod diff;
pub mod logs;
pub mod render;
pub mod server;

use anyhow::{Context, Result};

use ignis_core::{store, AppConfig, ModelSnapshot};
use ignis_detector::{Capabilities, SupportedFeatures};
use ignis_renderer::{ConfigPaths, GeoIpProvider};
use ignis_sync::Synthesizer;

pub fn load_config() -> Result<AppConfig> {
    AppConfig::load().context("failed to load ignis configuration")
}

/// Run `nginx -V` on a throwaway runtime.
pub fn probe(config: &AppConfig) -> Result<Capabilities> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime
        .block_on(ignis_detector::probe(
            &config.nginx_binary,
            config.probe_timeout,
        ))
        .with_context(|| format!("failed to probe {}", config.nginx_binary.display()))
}

pub fn probe_features(config: &AppConfig) -> Result<SupportedFeatures> {
    Ok(probe(config)?.supported_features())
}

pub fn load_model(config: &AppConfig) -> Result<ModelSnapshot> {
    store::load_at(&config.model_path)
        .with_context(|| format!("failed to load model {}", config.model_path.display()))
}

pub fn synthesizer(config: &AppConfig) -> Result<Synthesizer> {
    Synthesizer::new(
        ConfigPaths::new(&config.config_root),
        GeoIpProvider::http(config.geoip.clone()),
    )
    .context("failed to initialise templates")
}
