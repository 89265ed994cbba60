//! Failed job subcommand handlers.

use mediaqueue_config::Config;
use mediaqueue_workqueue::JobId;

use crate::cli::FailedAction;
use crate::server::{job_queue, open_stores};

/// Handle failed job subcommands.
pub(crate) async fn handle_failed_command(
    action: FailedAction,
    config: &Config,
) -> anyhow::Result<()> {
    let stores = open_stores(&config.database).await?;
    let queue = job_queue(config, &stores);

    match action {
        FailedAction::List { format } => {
            let failed = queue.failed_jobs(None).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&failed)?);
                return Ok(());
            }

            if failed.is_empty() {
                println!("No failed jobs.");
                return Ok(());
            }
            println!("{:<6} {:<12} {:<26} {}", "ID", "QUEUE", "FAILED AT", "REASON");
            for job in failed {
                let reason = job.exception.lines().next().unwrap_or_default();
                println!(
                    "{:<6} {:<12} {:<26} {}",
                    job.id,
                    job.queue,
                    job.failed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    reason
                );
            }
        }
        FailedAction::Retry { id } => {
            let count = queue.retry_failed_jobs(id.map(JobId)).await;
            println!("Requeued {} failed job(s).", count);
        }
    }

    Ok(())
}
