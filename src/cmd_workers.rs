//! Worker count subcommand handlers.

use mediaqueue_config::Config;
use mediaqueue_workqueue::runners_key;

use crate::cli::WorkersAction;
use crate::server::open_stores;

/// Handle worker subcommands.
pub(crate) async fn handle_workers_command(
    action: WorkersAction,
    config: &Config,
) -> anyhow::Result<()> {
    let stores = open_stores(&config.database).await?;

    match action {
        WorkersAction::List => {
            println!("{:<16} {:<10} {}", "QUEUE", "DEFAULT", "PERSISTED");
            for (name, default_count) in &config.queues {
                let persisted = stores.settings.get_value(&runners_key(name)).await?;
                println!(
                    "{:<16} {:<10} {}",
                    name,
                    default_count,
                    persisted.as_deref().unwrap_or("-")
                );
            }
        }
        WorkersAction::Set { queue, count, actor } => {
            stores
                .settings
                .set_value_by(&runners_key(&queue), &count.to_string(), actor.as_deref())
                .await?;
            if !config.queues.contains_key(&queue) {
                println!("Note: queue '{}' is not in the configuration file.", queue);
            }
            println!("{} set to {} (applied on next start).", runners_key(&queue), count);
        }
    }

    Ok(())
}
