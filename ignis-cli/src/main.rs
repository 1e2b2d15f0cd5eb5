//! Ignis: nginx control plane CLI.
//!
//! # Usage
//!
//! ```text
//! ignis detect [--json]
//! ignis render [--contents | --file <name>]
//! ignis apply [--reload]
//! ignis diff [--stat]
//! ignis server start|stop|reload|rotate|status
//! ignis daemon run|stop
//! ignis logs tail [--host <id> [--error]] [--lines <n>]
//! ignis logs search <query> [--host <id> [--error]] [--lines <n>] [--window <n>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, daemon::DaemonCommand, detect::DetectArgs, diff::DiffArgs,
    logs::LogsCommand, render::RenderArgs, server::ServerCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ignis",
    version,
    about = "Generate nginx configuration from a domain model and supervise nginx",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the nginx binary and report the features it supports.
    Detect(DetectArgs),

    /// Synthesise the configuration tree without writing it.
    Render(RenderArgs),

    /// Synthesise the configuration tree and replace `config/` on disk.
    Apply(ApplyArgs),

    /// Show unified diffs between the current tree and a fresh synthesis.
    Diff(DiffArgs),

    /// Control nginx through the running daemon.
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },

    /// Run or stop the supervising daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Read the nginx log files.
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(
        cli.command,
        Commands::Daemon {
            command: DaemonCommand::Run
        }
    ) {
        ignis_daemon::init_tracing("warn");
    }

    match cli.command {
        Commands::Detect(args) => args.run(),
        Commands::Render(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Server { command } => commands::server::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Logs { command } => commands::logs::run(command),
    }
}
