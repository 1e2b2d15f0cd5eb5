//! `ignis render`: synthesise the tree in memory and show it.

use anyhow::{bail, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use ignis_renderer::ConfigurationFile;

/// Arguments for `ignis render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Print every generated text file instead of the file list.
    #[arg(long, conflicts_with = "file")]
    pub contents: bool,

    /// Print one generated file.
    #[arg(long, value_name = "NAME")]
    pub file: Option<String>,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "file")]
    name: String,
    #[tabled(rename = "bytes")]
    bytes: usize,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config()?;
        let features = super::probe_features(&config)?;
        let model = super::load_model(&config)?;
        let synthesis = super::synthesizer(&config)?
            .get_configuration_files(&features, &model, &model)?;

        if let Some(name) = &self.file {
            let Some(file) = synthesis.files.iter().find(|f| &f.name == name) else {
                bail!("no generated file named '{name}'");
            };
            print_file(file, false);
            return Ok(());
        }

        if self.contents {
            for file in &synthesis.files {
                print_file(file, true);
            }
            return Ok(());
        }

        let rows: Vec<FileRow> = synthesis
            .files
            .iter()
            .map(|f| FileRow {
                name: f.name.clone(),
                bytes: f.contents.len(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!(
            "{} files for {} hosts and {} streams (nothing written)",
            synthesis.files.len(),
            synthesis.hosts.len(),
            synthesis.streams.len()
        );
        Ok(())
    }
}

fn print_file(file: &ConfigurationFile, header: bool) {
    if header {
        println!("==> {} <==", file.name);
    }
    match file.as_text() {
        Some(text) => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
        None => println!("<binary, {} bytes>", file.contents.len()),
    }
}
