//! `ignis daemon`: run the supervising daemon or ask it to exit.

use anyhow::{Context, Result};
use clap::Subcommand;

use ignis_daemon::{request, start_blocking, DaemonError, DaemonRequest};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Run,
    /// Stop nginx and shut the daemon down.
    Stop,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let config = super::load_config()?;

    match command {
        DaemonCommand::Run => {
            start_blocking(config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request(&config.control_socket, DaemonRequest::Shutdown) {
            Ok(_) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
    }

    Ok(())
}
