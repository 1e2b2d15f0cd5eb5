//! `ignis logs`: tail and search the nginx log files.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use ignis_core::types::HostId;
use ignis_daemon::logs::DEFAULT_TAIL_LINES;
use ignis_daemon::{search, tail, SearchLine};
use ignis_renderer::{names, ConfigPaths};

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Print the last lines of a log file.
    Tail(LogArgs),
    /// Print matching lines with surrounding context.
    Search(SearchArgs),
}

/// Which log file to read.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Read a host's access log instead of the main log.
    #[arg(long, value_name = "ID")]
    pub host: Option<String>,

    /// With `--host`, read the error log instead of the access log.
    #[arg(long, requires = "host")]
    pub error: bool,

    /// Number of trailing lines to read.
    #[arg(long, default_value_t = DEFAULT_TAIL_LINES)]
    pub lines: usize,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Words that must appear in order on a line.
    pub query: String,

    #[command(flatten)]
    pub log: LogArgs,

    /// Lines of context around each match.
    #[arg(long, default_value_t = 0)]
    pub window: usize,
}

pub fn run(command: LogsCommand) -> Result<()> {
    let config = super::load_config()?;
    let paths = ConfigPaths::new(&config.config_root);

    match command {
        LogsCommand::Tail(args) => {
            let path = log_path(&paths, &args)?;
            for line in tail(&path, Some(args.lines))
                .with_context(|| format!("failed to read {}", path.display()))?
            {
                println!("{line}");
            }
        }
        LogsCommand::Search(args) => {
            let path = log_path(&paths, &args.log)?;
            let lines = tail(&path, Some(args.log.lines))
                .with_context(|| format!("failed to read {}", path.display()))?;
            for line in search(&lines, &args.query, args.window)? {
                println!("{}", render_line(&line));
            }
        }
    }
    Ok(())
}

fn log_path(paths: &ConfigPaths, args: &LogArgs) -> Result<PathBuf> {
    let name = match &args.host {
        None => return Ok(paths.main_log()),
        Some(id) if id.trim().is_empty() => bail!("host id must not be empty"),
        Some(id) if args.error => names::host_error_log(&HostId::from(id.as_str())),
        Some(id) => names::host_access_log(&HostId::from(id.as_str())),
    };
    Ok(paths.log_file(&name))
}

fn render_line(line: &SearchLine) -> String {
    let Some(highlight) = line.highlight else {
        return line.text.bright_black().to_string();
    };
    let chars: Vec<char> = line.text.chars().collect();
    let before: String = chars[..highlight.start].iter().collect();
    let matched: String = chars[highlight.start..highlight.end].iter().collect();
    let after: String = chars[highlight.end..].iter().collect();
    format!("{before}{}{after}", matched.yellow().bold())
}
