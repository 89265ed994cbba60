//! mediaqueue - durable job queue and worker pools for a self-hosted media server.
//!
//! Main entry point for the mediaqueue CLI and worker process.

mod cli;
mod cmd_cron;
mod cmd_failed;
mod cmd_workers;
mod server;

use clap::Parser;
use tracing::{error, warn};

use mediaqueue_config::{ConfigLoader, ConfigValidator};
use mediaqueue_workqueue::JobRegistry;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(&cli.config)?;
    server::init_tracing(&config.logging)?;

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!(path = %warning.path, "Config warning: {}", warning.message);
    }
    for err in &validation.errors {
        error!(path = %err.path, "Config error: {}", err.message);
    }

    match cli.command {
        Some(Commands::CheckConfig) => {
            if validation.is_valid() {
                println!("Configuration OK ({}).", cli.config.display());
                Ok(())
            } else {
                anyhow::bail!("configuration has {} error(s)", validation.errors.len())
            }
        }
        _ if !validation.is_valid() => {
            anyhow::bail!("invalid configuration in {}", cli.config.display())
        }
        None | Some(Commands::Run) => server::run_server(config, JobRegistry::new()).await,
        Some(Commands::Failed { action }) => {
            cmd_failed::handle_failed_command(action, &config).await
        }
        Some(Commands::Workers { action }) => {
            cmd_workers::handle_workers_command(action, &config).await
        }
        Some(Commands::Cron { action }) => cmd_cron::handle_cron_command(action, &config).await,
    }
}
