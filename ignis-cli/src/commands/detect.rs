//! `ignis detect`: report what the configured nginx binary supports.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ignis_detector::SupportType;

/// Arguments for `ignis detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "feature")]
    feature: String,
    #[tabled(rename = "support")]
    support: String,
}

impl DetectArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config()?;
        let capabilities = super::probe(&config)?;
        let features = capabilities.supported_features();

        if self.json {
            let payload = serde_json::json!({
                "binary": config.nginx_binary.display().to_string(),
                "capabilities": capabilities,
                "features": features,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize JSON")?
            );
            return Ok(());
        }

        println!(
            "nginx {} ({})",
            capabilities.version.as_deref().unwrap_or("unknown").bold(),
            config.nginx_binary.display()
        );
        if let Some(build) = &capabilities.build {
            println!("built {build}");
        }

        let rows = vec![
            row("stream", features.stream_type),
            row("run code", features.run_code_type),
            row("tls sni", features.tls_sni),
            row("stats", features.stats_type),
        ];
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        if let Some(path) = &features.modules_path {
            println!("modules path: {}", path.display());
        }
        if !capabilities.modules.is_empty() {
            println!("modules: {}", capabilities.modules.join(", "));
        }
        Ok(())
    }
}

fn row(feature: &str, support: SupportType) -> FeatureRow {
    FeatureRow {
        feature: feature.to_string(),
        support: support_label(support),
    }
}

fn support_label(support: SupportType) -> String {
    match support {
        SupportType::None => "none".red().to_string(),
        SupportType::Static => "static".green().to_string(),
        SupportType::Dynamic => "dynamic".cyan().to_string(),
    }
}
