mod interest;
mod maintenance;
mod statement;

use std::collections::HashMap;

use async_trait::async_trait;
use kobo_scheduler::{AlertSink, DeadAction, Job, JobOptions, JobQueue, Scheduler};
use serde_json::Value;
use tracing::error;

use crate::context::AppContext;
use crate::outbound::EmailService;

pub use interest::*;
pub use maintenance::*;
pub use statement::*;

pub const DAILY_STATEMENT_GENERATION: &str = "DailyStatementGeneration";
pub const MONTHLY_INTEREST_CALCULATION: &str = "MonthlyInterestCalculation";
pub const ACCOUNT_CLEANUP: &str = "AccountCleanup";

pub fn default_schedules() -> HashMap<String, String> {
    HashMap::from([
        (DAILY_STATEMENT_GENERATION.to_owned(), "0 2 * * *".to_owned()),
        (MONTHLY_INTEREST_CALCULATION.to_owned(), "0 1 1 * *".to_owned()),
        (ACCOUNT_CLEANUP.to_owned(), "0 0 * * 0".to_owned()),
    ])
}

/// Registers every job handler this service ships.
pub fn register_handlers(scheduler: Scheduler, ctx: &AppContext) -> Scheduler {
    scheduler
        .register_with(
            DAILY_STATEMENT_GENERATION,
            StatementJob::new(ctx.clone()),
            JobOptions {
                queue: JobQueue::Default,
                // a dead statement run is deleted; the next day's run covers
                // the same ground
                on_dead: DeadAction::Delete,
            },
        )
        .register_with(
            MONTHLY_INTEREST_CALCULATION,
            InterestJob::new(ctx.clone()),
            JobOptions {
                queue: JobQueue::Critical,
                on_dead: DeadAction::Keep,
            },
        )
        .register_with(
            ACCOUNT_CLEANUP,
            MaintenanceJob::new(ctx.clone()),
            JobOptions {
                queue: JobQueue::Low,
                on_dead: DeadAction::Keep,
            },
        )
}

/// Writes the desired recurring set; reruns at boot overwrite in place.
pub async fn register_schedules(
    scheduler: &Scheduler,
    schedules: &HashMap<String, String>,
) -> kobo_scheduler::Result<()> {
    for (recurring_id, cron) in schedules {
        scheduler
            .schedule(recurring_id, recurring_id, Value::Null, cron)
            .await?;
    }

    Ok(())
}

/// Routes exhausted jobs to the operator mailbox.
#[derive(Clone)]
pub struct DeadJobAlert {
    email: Box<dyn EmailService>,
}

impl DeadJobAlert {
    pub fn new(email: Box<dyn EmailService>) -> Self {
        Self { email }
    }
}

#[async_trait]
impl AlertSink for DeadJobAlert {
    async fn job_dead(&self, job: &Job) {
        let detail = job.last_error.clone().unwrap_or_default();

        if let Err(e) = self
            .email
            .send_job_failure_alert(
                &format!("Job {} exhausted its retries", job.target),
                &format!("job {} failed {} time(s)", job.id, job.attempts),
                &detail,
            )
            .await
        {
            error!(job = %job.id, "failed to send dead-job alert: {e}");
        }
    }
}
