//! `ignis server`: nginx lifecycle requests sent to the daemon socket.

use anyhow::{Context, Result};
use clap::Subcommand;

use ignis_daemon::{request, request_status, DaemonError, DaemonRequest};

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Start nginx.
    Start,
    /// Stop nginx; the daemon keeps running.
    Stop,
    /// Regenerate the configuration and reload nginx.
    Reload,
    /// Rotate the log files now.
    Rotate,
    /// Show daemon and nginx status.
    Status,
}

pub fn run(command: ServerCommand) -> Result<()> {
    let config = super::load_config()?;
    let socket = &config.control_socket;

    let (request_kind, done) = match command {
        ServerCommand::Start => (DaemonRequest::Start, "nginx started"),
        ServerCommand::Stop => (DaemonRequest::Stop, "nginx stopped"),
        ServerCommand::Reload => (DaemonRequest::Reload, "nginx reloaded"),
        ServerCommand::Rotate => (DaemonRequest::Rotate, "logs rotated"),
        ServerCommand::Status => {
            let payload = match request_status(socket) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket.display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
            return Ok(());
        }
    };

    request(socket, request_kind).with_context(|| format!("{request_kind:?} request failed"))?;
    println!("{done}");
    Ok(())
}
