//! `ignis diff`: show unified diffs for what `apply` would write.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ignis_sync::{ChangeKind, DiffReport};

/// Arguments for `ignis diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only list changed files.
    #[arg(long)]
    pub stat: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config()?;
        let features = super::probe_features(&config)?;
        let model = super::load_model(&config)?;
        let report = super::synthesizer(&config)?
            .diff_configuration_files(&features, &model, &model)
            .context("diff failed")?;

        if report.is_clean() {
            println!("No differences.");
            return Ok(());
        }

        if self.stat {
            print_stat(&report);
            return Ok(());
        }

        for change in &report.changes {
            print!("{}", change.unified_diff);
            if !change.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}

fn print_stat(report: &DiffReport) {
    for change in &report.changes {
        let marker = match change.kind {
            ChangeKind::Added => "A".green(),
            ChangeKind::Changed => "M".yellow(),
            ChangeKind::Removed => "D".red(),
        };
        println!("{marker} {}", change.name);
    }
    println!(
        "{} added, {} changed, {} removed",
        report.count(ChangeKind::Added),
        report.count(ChangeKind::Changed),
        report.count(ChangeKind::Removed)
    );
}
