use async_trait::async_trait;
use chrono::{Duration, Utc};
use kobo_scheduler::JobHandler;
use kobo_store::AccountUpdate;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::context::AppContext;

/// Accounts idle for this long are candidates for the status rules.
const INACTIVITY_SCAN_DAYS: i64 = 730;

/// Zero-balance accounts idle for this long are archived.
const ARCHIVE_AFTER_DAYS: i64 = 1095;

/// Transactions older than this are enumerated for archival.
const TRANSACTION_ARCHIVE_DAYS: i64 = 365 * 7;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MaintenanceReport {
    pub deactivated: usize,
    pub archived: usize,
    pub archivable_transactions: usize,
}

/// Weekly account maintenance: status cleanup of stale accounts, then a
/// count of transactions past the archival cutoff (the archival target
/// itself lives outside this service).
#[derive(Clone)]
pub struct MaintenanceJob {
    ctx: AppContext,
}

impl MaintenanceJob {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for MaintenanceJob {
    async fn run(&self, _args: &Value) -> anyhow::Result<Value> {
        let report = run_maintenance(&self.ctx).await?;

        Ok(serde_json::to_value(report)?)
    }
}

pub async fn run_maintenance(ctx: &AppContext) -> anyhow::Result<MaintenanceReport> {
    let now = Utc::now();
    let mut report = MaintenanceReport::default();

    let stale = ctx
        .store
        .inactive_accounts_since(now - Duration::days(INACTIVITY_SCAN_DAYS))
        .await?;
    let mut updates = Vec::new();

    for mut account in stale {
        let mut changed = account.update_status_based_on_rules(now);

        if account.balance().is_zero()
            && account.last_activity < now - Duration::days(ARCHIVE_AFTER_DAYS)
        {
            account.mark_archived();
            changed = true;
            report.archived += 1;
        } else if changed {
            report.deactivated += 1;
        }

        if changed {
            updates.push(AccountUpdate::capture(&mut account));
        }
    }

    if !updates.is_empty() {
        ctx.store.update_accounts(&updates).await?;
    }

    let archivable = ctx
        .store
        .transactions_older_than(now - Duration::days(TRANSACTION_ARCHIVE_DAYS))
        .await?;
    report.archivable_transactions = archivable.len();

    info!(
        deactivated = report.deactivated,
        archived = report.archived,
        archivable_transactions = report.archivable_transactions,
        "maintenance run finished"
    );

    Ok(report)
}
