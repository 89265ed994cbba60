//! Cron job subcommand handlers.

use anyhow::{Context, anyhow, bail};
use chrono::Weekday;

use mediaqueue_config::Config;
use mediaqueue_cron::CronExpressionBuilder;
use mediaqueue_workqueue::CronJob;

use crate::cli::CronAction;
use crate::server::open_stores;

/// Handle cron subcommands.
pub(crate) async fn handle_cron_command(action: CronAction, config: &Config) -> anyhow::Result<()> {
    let stores = open_stores(&config.database).await?;

    match action {
        CronAction::List => {
            let jobs = stores.queue.get_cron_jobs().await?;
            if jobs.is_empty() {
                println!("No cron jobs.");
                return Ok(());
            }
            println!(
                "{:<20} {:<16} {:<20} {:<8} {}",
                "NAME", "EXPRESSION", "JOB TYPE", "ENABLED", "LAST RUN"
            );
            for job in jobs {
                let last_run = job
                    .last_run
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<20} {:<16} {:<20} {:<8} {}",
                    job.name, job.cron_expression, job.job_type, job.is_enabled, last_run
                );
            }
        }
        CronAction::Add {
            name,
            job_type,
            at,
            weekday,
            expression,
            parameters,
            disabled,
        } => {
            let expression = match (expression, at) {
                (Some(expression), _) => expression,
                (None, Some(at)) => schedule_expression(&at, weekday.as_deref())?,
                (None, None) => bail!("either --at or --expression is required"),
            };

            let mut job = CronJob::new(&name, &expression, job_type).with_parameters(parameters);
            if disabled {
                job = job.disabled();
            }
            stores
                .queue
                .add_cron_job(job)
                .await
                .with_context(|| format!("adding cron job '{}'", name))?;
            println!("Added cron job '{}' ({}).", name, expression);
        }
        CronAction::Remove { name } => {
            let Some(job) = stores.queue.find_cron_job_by_name(&name).await? else {
                bail!("cron job '{}' not found", name);
            };
            stores.queue.remove_cron_job(job.id).await?;
            println!("Removed cron job '{}'.", name);
        }
    }

    Ok(())
}

/// Daily (or weekly, with `weekday`) expression firing at `at` (`HH:MM`).
fn schedule_expression(at: &str, weekday: Option<&str>) -> anyhow::Result<String> {
    let (hour, minute) = parse_time_of_day(at)?;
    let builder = CronExpressionBuilder::new();
    let builder = match weekday {
        Some(day) => {
            let day: Weekday = day.parse().map_err(|_| anyhow!("invalid weekday '{}'", day))?;
            builder.weekly(day, hour, minute)?
        }
        None => builder.daily(hour, minute)?,
    };
    Ok(builder.build())
}

fn parse_time_of_day(at: &str) -> anyhow::Result<(u32, u32)> {
    let (hour, minute) = at
        .split_once(':')
        .ok_or_else(|| anyhow!("expected HH:MM, got '{}'", at))?;
    let hour = hour.trim().parse().with_context(|| format!("invalid hour in '{}'", at))?;
    let minute = minute.trim().parse().with_context(|| format!("invalid minute in '{}'", at))?;
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_expression() {
        assert_eq!(schedule_expression("03:15", None).unwrap(), "15 3 * * *");
    }

    #[test]
    fn test_weekly_expression() {
        assert_eq!(schedule_expression("22:00", Some("fri")).unwrap(), "0 22 * * 5");
        assert_eq!(schedule_expression("0:05", Some("Sunday")).unwrap(), "5 0 * * 0");
    }

    #[test]
    fn test_invalid_input() {
        assert!(schedule_expression("25:00", None).is_err());
        assert!(schedule_expression("0300", None).is_err());
        assert!(schedule_expression("03:00", Some("someday")).is_err());
    }
}
