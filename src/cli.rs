//! CLI definitions for mediaqueue.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mediaqueue CLI.
#[derive(Parser)]
#[command(name = "mediaqueue")]
#[command(about = "Durable job queue and worker pools for a self-hosted media server")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/default.toml",
        global = true,
        env = "MEDIAQUEUE_CONFIG"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the worker pools in the foreground (default). Needs a build that
    /// registers job types
    Run,

    /// Inspect and requeue failed jobs
    Failed {
        #[command(subcommand)]
        action: FailedAction,
    },

    /// Inspect and change worker counts
    Workers {
        #[command(subcommand)]
        action: WorkersAction,
    },

    /// Manage cron job records
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },

    /// Validate the configuration file and exit
    CheckConfig,
}

#[derive(Subcommand)]
pub(crate) enum FailedAction {
    /// List failed jobs
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Move failed jobs back into the queue
    Retry {
        /// Only retry this failed job
        #[arg(long)]
        id: Option<i64>,
    },
}

#[derive(Subcommand)]
pub(crate) enum WorkersAction {
    /// Show configured and persisted worker counts per queue
    List,

    /// Persist the worker count of a queue (applied on next start)
    Set {
        /// Queue name
        queue: String,

        /// Desired number of workers
        count: usize,

        /// Recorded as the author of the change
        #[arg(long, env = "USER")]
        actor: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum CronAction {
    /// List cron jobs
    List,

    /// Add a cron job
    Add {
        /// Unique cron job name
        name: String,

        /// Job type the scheduler dispatches
        job_type: String,

        /// Time of day as HH:MM
        #[arg(long, conflicts_with = "expression")]
        at: Option<String>,

        /// Run weekly on this day instead of daily (e.g. mon, friday)
        #[arg(long, requires = "at")]
        weekday: Option<String>,

        /// Raw five-field cron expression
        #[arg(long)]
        expression: Option<String>,

        /// Parameters handed to the dispatched job
        #[arg(long, default_value = "")]
        parameters: String,

        /// Store the cron job disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a cron job
    Remove {
        /// Cron job name
        name: String,
    },
}
