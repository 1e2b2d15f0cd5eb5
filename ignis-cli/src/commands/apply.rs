//! `ignis apply`: replace `config/` with a fresh synthesis.
//!
//! A running daemon owns the tree, so the work is handed to it over the
//! control socket. The tree is written from this process only when no
//! daemon answers.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use ignis_daemon::{request, DaemonError, DaemonRequest};
use ignis_renderer::ConfigPaths;

/// Arguments for `ignis apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Ask the running daemon to reload nginx afterwards.
    #[arg(long)]
    pub reload: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config()?;
        let daemon_request = if self.reload {
            DaemonRequest::Reload
        } else {
            DaemonRequest::Apply
        };

        match request(&config.control_socket, daemon_request) {
            Ok(_) => {
                println!(
                    "{} daemon regenerated {}",
                    "✓".green(),
                    ConfigPaths::new(&config.config_root).config_dir().display()
                );
                if self.reload {
                    println!("{} nginx reloaded", "✓".green());
                }
                return Ok(());
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {}
            Err(err) => return Err(err).context(format!("{daemon_request:?} request failed")),
        }

        let features = super::probe_features(&config)?;
        let model = super::load_model(&config)?;
        let synthesizer = super::synthesizer(&config)?;
        let synthesis = synthesizer
            .replace_configuration_files(&features, &model, &model)
            .context("failed to replace configuration files")?;

        println!(
            "{} wrote {} files to {}",
            "✓".green(),
            synthesis.files.len(),
            synthesizer.paths().config_dir().display()
        );

        if self.reload {
            bail!("nginx was not reloaded: the daemon is not running");
        }
        Ok(())
    }
}
