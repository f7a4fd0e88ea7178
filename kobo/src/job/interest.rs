use async_trait::async_trait;
use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use kobo_core::{Account, AccountType, Money, Transaction};
use kobo_scheduler::JobHandler;
use kobo_store::UnitOfWork;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::AppContext;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InterestReport {
    pub credited: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Monthly interest accrual over the calendar month containing the
/// calculation date.
#[derive(Clone)]
pub struct InterestJob {
    ctx: AppContext,
}

impl InterestJob {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for InterestJob {
    async fn run(&self, args: &Value) -> anyhow::Result<Value> {
        let calculation_date = args
            .get("calculationDate")
            .and_then(Value::as_str)
            .map(|s| s.parse::<NaiveDate>())
            .transpose()?
            .unwrap_or_else(|| Utc::now().date_naive());

        let report = accrue_interest(&self.ctx, calculation_date).await?;

        Ok(serde_json::to_value(report)?)
    }
}

/// Annual rate by (type, balance): Savings 1.5 % from 10 000 else 1.0 %,
/// Checking 0.1 %, FixedDeposit 3.5 %.
pub fn annual_rate(account_type: AccountType, balance: Decimal) -> Decimal {
    match account_type {
        AccountType::Savings => {
            if balance >= dec!(10000) {
                dec!(0.015)
            } else {
                dec!(0.010)
            }
        }
        AccountType::Checking => dec!(0.001),
        AccountType::FixedDeposit => dec!(0.035),
    }
}

pub async fn accrue_interest(
    ctx: &AppContext,
    calculation_date: NaiveDate,
) -> anyhow::Result<InterestReport> {
    let first_day = calculation_date
        .with_day(1)
        .ok_or_else(|| anyhow::anyhow!("invalid calculation date"))?;
    let last_day = first_day + Months::new(1) - Duration::days(1);
    let start = first_day
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid month start"))?;
    let end = last_day
        .and_hms_opt(23, 59, 59)
        .map(|t| t.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid month end"))?;
    let days_in_window = (last_day - first_day).num_days() + 1;

    let accounts = ctx.store.interest_bearing_accounts().await?;
    let mut report = InterestReport::default();
    let mut uow = UnitOfWork::new();

    for account in accounts {
        match accrue_one(ctx, account, days_in_window, start, end).await {
            Ok(Some((account, credit))) => {
                uow.update_account(account);
                uow.insert_transaction(credit);
                report.credited += 1;
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                warn!("interest accrual failed for one account: {e}");
                report.failed += 1;
            }
        }
    }

    // every credit and balance update lands in one transaction
    if report.credited > 0 {
        uow.commit(&ctx.store).await?;
    }

    info!(
        %calculation_date,
        credited = report.credited,
        skipped = report.skipped,
        failed = report.failed,
        "interest run finished"
    );

    Ok(report)
}

async fn accrue_one(
    ctx: &AppContext,
    mut account: Account,
    days_in_window: i64,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> anyhow::Result<Option<(Account, Transaction)>> {
    let principal = ctx
        .store
        .average_daily_balance(account.id, start, end)
        .await?;
    let rate = annual_rate(account.account_type, principal);
    let interest =
        (principal * rate * Decimal::from(days_in_window) / dec!(365)).round_dp(4);

    if interest <= Decimal::ZERO {
        return Ok(None);
    }

    let credit = Transaction::interest_credit(
        account.id,
        Money::new(interest, account.balance().currency())?,
        end,
        format!("Interest for {}", start.format("%Y-%m")),
    );
    account.apply_interest(credit.clone())?;

    Ok(Some((account, credit)))
}
