use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::join_all;
use kobo_core::Account;
use kobo_scheduler::JobHandler;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::AppContext;

/// Accounts rendered per batch; members of one batch run concurrently.
const STATEMENT_BATCH_SIZE: usize = 100;

/// Days of history included in a statement.
const STATEMENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatementReport {
    pub processed: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

/// Daily statement generation: render every active account's statement and
/// mail it to opted-in owners.
#[derive(Clone)]
pub struct StatementJob {
    ctx: AppContext,
}

impl StatementJob {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for StatementJob {
    async fn run(&self, args: &Value) -> anyhow::Result<Value> {
        let statement_date = args
            .get("statementDate")
            .and_then(Value::as_str)
            .map(|s| s.parse::<NaiveDate>())
            .transpose()?
            .unwrap_or_else(|| Utc::now().date_naive());

        let report = generate_statements(&self.ctx, statement_date).await?;

        Ok(serde_json::to_value(report)?)
    }
}

pub async fn generate_statements(
    ctx: &AppContext,
    statement_date: NaiveDate,
) -> anyhow::Result<StatementReport> {
    let started = Instant::now();
    let accounts = ctx.store.active_accounts().await?;
    let mut report = StatementReport::default();

    for batch in accounts.chunks(STATEMENT_BATCH_SIZE) {
        let results = join_all(
            batch
                .iter()
                .map(|account| generate_one(ctx, account, statement_date)),
        )
        .await;

        // one bad account never sinks the batch
        for (account, result) in batch.iter().zip(results) {
            match result {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    warn!(account = %account.account_number, "statement failed: {e}");
                    report.failed += 1;
                }
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis();
    info!(
        %statement_date,
        processed = report.processed,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "statement run finished"
    );

    Ok(report)
}

async fn generate_one(
    ctx: &AppContext,
    account: &Account,
    statement_date: NaiveDate,
) -> anyhow::Result<()> {
    let start = (statement_date - Duration::days(STATEMENT_WINDOW_DAYS))
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid statement window start"))?;
    let end = statement_date
        .and_hms_opt(23, 59, 59)
        .map(|t| t.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid statement window end"))?;

    let transactions = ctx
        .store
        .transactions_in_range(account.id, start, end)
        .await?;
    let artifact = ctx
        .renderer
        .render_account_statement(account, &transactions, start, end)
        .await?;

    let owner = ctx
        .store
        .customer_by_id(account.customer_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("owner of {} not found", account.account_number))?;

    if owner.email_opt_in {
        ctx.email
            .send_statement_notification(owner.email(), &owner.full_name(), statement_date, &artifact)
            .await?;
    }

    Ok(())
}
