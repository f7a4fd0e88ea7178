use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kobo_core::{
    Account, AccountId, AccountNumber, AccountStatus, Customer, CustomerId, Transaction,
    TransactionId,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::Result;
use crate::outbox::OutboxMessage;
use crate::uow::{AccountUpdate, Commit};

/// Typed access to persistent state. Cheap to clone; repositories always hit
/// the engine, no domain state is cached here.
#[derive(Clone)]
pub struct Store {
    engine: Arc<dyn Engine>,
}

impl Store {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        self.engine.customer_by_id(id).await
    }

    pub async fn customer_exists(&self, id: CustomerId) -> Result<bool> {
        self.engine.customer_exists(id).await
    }

    pub async fn customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        self.engine.customer_by_email(email).await
    }

    pub async fn customers(&self) -> Result<Vec<Customer>> {
        self.engine.customers().await
    }

    pub async fn update_customer(&self, customer: &Customer) -> Result<()> {
        self.engine.update_customer(customer).await
    }

    pub async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        self.engine.account_by_id(id).await
    }

    pub async fn account_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        self.engine.account_by_number(number).await
    }

    pub async fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        self.engine.accounts_for_customer(customer_id).await
    }

    pub async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool> {
        self.engine.account_number_exists(number).await
    }

    pub async fn active_accounts(&self) -> Result<Vec<Account>> {
        self.engine.active_accounts().await
    }

    pub async fn interest_bearing_accounts(&self) -> Result<Vec<Account>> {
        self.engine.interest_bearing_accounts().await
    }

    pub async fn inactive_accounts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        self.engine.inactive_accounts_since(cutoff).await
    }

    pub async fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        self.engine.accounts_by_status(status).await
    }

    pub async fn low_balance_accounts(&self, threshold: Decimal) -> Result<Vec<Account>> {
        self.engine.low_balance_accounts(threshold).await
    }

    pub async fn update_accounts(&self, updates: &[AccountUpdate]) -> Result<()> {
        self.engine.update_accounts(updates).await
    }

    pub async fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.engine.transaction_by_id(id).await
    }

    pub async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.engine.transactions_by_account(account_id).await
    }

    pub async fn transactions_in_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.engine.transactions_in_range(account_id, start, end).await
    }

    pub async fn transactions_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.engine.transactions_older_than(cutoff).await
    }

    pub async fn recent_transactions(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.engine.recent_transactions(account_id, since).await
    }

    pub async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.engine.transactions_between(start, end).await
    }

    pub async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        self.engine.insert_transactions(transactions).await
    }

    pub async fn commit(&self, commit: Commit) -> Result<()> {
        self.engine.commit(commit).await
    }

    pub async fn pending_outbox(&self, limit: u32, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        self.engine.pending_outbox(limit, max_retries).await
    }

    pub async fn save_outbox(&self, messages: &[OutboxMessage]) -> Result<()> {
        self.engine.save_outbox(messages).await
    }

    pub async fn dead_outbox(&self, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        self.engine.dead_outbox(max_retries).await
    }

    pub async fn requeue_outbox(&self, id: Uuid) -> Result<bool> {
        self.engine.requeue_outbox(id).await
    }

    pub async fn outbox_by_id(&self, id: Uuid) -> Result<Option<OutboxMessage>> {
        self.engine.outbox_by_id(id).await
    }

    /// Mean end-of-day balance over `[start, end]`, both truncated to
    /// midnight UTC by the caller. The running balance is seeded with the
    /// net of every transaction dated before the window, so the figure
    /// reflects the account's actual position rather than in-window churn.
    pub async fn average_daily_balance(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal> {
        let start_day = start.date_naive();
        let end_day = end.date_naive();
        let days = (end_day - start_day).num_days() + 1;

        if days <= 0 {
            return Ok(Decimal::ZERO);
        }

        let bound = (end_day + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(end);
        let rows = self.engine.transactions_through(account_id, bound).await?;

        let mut balance = Decimal::ZERO;
        let mut idx = 0;

        while idx < rows.len() && rows[idx].timestamp.date_naive() < start_day {
            balance += signed_amount(&rows[idx]);
            idx += 1;
        }

        let mut accumulated = Decimal::ZERO;
        let mut day = start_day;

        while day <= end_day {
            while idx < rows.len() && rows[idx].timestamp.date_naive() == day {
                balance += signed_amount(&rows[idx]);
                idx += 1;
            }

            accumulated += balance;
            day = day + Duration::days(1);
        }

        Ok(accumulated / Decimal::from(days))
    }
}

fn signed_amount(tx: &Transaction) -> Decimal {
    if tx.tx_type.is_credit() {
        tx.amount.amount()
    } else {
        -tx.amount.amount()
    }
}
