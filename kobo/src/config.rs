use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use kobo_mq::RelayConfig;
use kobo_scheduler::SchedulerConfig;

use crate::job;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Service configuration: sensible defaults, overridable from the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub outbox: RelayConfig,
    pub scheduler: SchedulerConfig,
    /// recurring-id → cron expression, written idempotently at boot.
    pub scheduled_jobs: HashMap<String, String>,
}

impl Config {
    /// `KOBO_DATABASE_URL` is required; everything else falls back to the
    /// documented defaults. Job crons override via
    /// `KOBO_JOB_<SCREAMING_SNAKE_ID>_CRON`.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("KOBO_DATABASE_URL")
            .map_err(|_| anyhow!("KOBO_DATABASE_URL is required"))?;

        let mut outbox = RelayConfig::default();

        if let Some(secs) = read_env::<u64>("KOBO_OUTBOX_POLL_INTERVAL_SECS")? {
            outbox.poll_interval = Duration::from_secs(secs);
        }
        if let Some(size) = read_env("KOBO_OUTBOX_BATCH_SIZE")? {
            outbox.batch_size = size;
        }
        if let Some(retries) = read_env("KOBO_OUTBOX_MAX_RETRIES")? {
            outbox.max_retries = retries;
        }

        let mut scheduler = SchedulerConfig::default();

        if let Some(workers) = read_env("KOBO_SCHEDULER_WORKER_COUNT")? {
            scheduler.worker_count = workers;
        }
        if let Some(retries) = read_env("KOBO_SCHEDULER_RETRY_ATTEMPTS")? {
            scheduler.retry_attempts = retries;
        }

        let mut scheduled_jobs = job::default_schedules();

        for (recurring_id, cron) in scheduled_jobs.iter_mut() {
            let key = format!("KOBO_JOB_{}_CRON", screaming_snake(recurring_id));

            if let Ok(value) = std::env::var(&key) {
                *cron = value;
            }
        }

        Ok(Self {
            database: DatabaseConfig { url },
            outbox,
            scheduler,
            scheduled_jobs,
        })
    }
}

fn read_env<T: FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(None),
    }
}

fn screaming_snake(name: &str) -> String {
    let mut out = String::new();

    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }

        out.push(c.to_ascii_uppercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_map_to_env_keys() {
        assert_eq!(
            screaming_snake("DailyStatementGeneration"),
            "DAILY_STATEMENT_GENERATION"
        );
        assert_eq!(screaming_snake("AccountCleanup"), "ACCOUNT_CLEANUP");
    }

    #[test]
    fn documented_defaults() {
        let outbox = RelayConfig::default();
        assert_eq!(outbox.poll_interval, Duration::from_secs(30));
        assert_eq!(outbox.batch_size, 20);
        assert_eq!(outbox.max_retries, 3);

        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.worker_count, 5);
        assert_eq!(scheduler.retry_attempts, 3);

        let jobs = job::default_schedules();
        assert_eq!(jobs["DailyStatementGeneration"], "0 2 * * *");
        assert_eq!(jobs["MonthlyInterestCalculation"], "0 1 1 * *");
        assert_eq!(jobs["AccountCleanup"], "0 0 * * 0");
    }
}
