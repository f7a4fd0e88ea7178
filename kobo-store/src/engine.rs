use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kobo_core::{
    Account, AccountId, AccountNumber, AccountStatus, Customer, CustomerId, Transaction,
    TransactionId,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::outbox::OutboxMessage;
use crate::uow::{AccountUpdate, Commit};

mod memory;
pub use memory::Memory;

#[cfg(feature = "pg")]
mod pg;
#[cfg(feature = "pg")]
pub use pg::{migrate, Pg};

/// Storage backend. Soft-deleted rows are invisible to every read; account
/// loads by id or number come back with their transactions, bulk account
/// queries leave the children empty.
#[async_trait]
pub trait Engine: Send + Sync {
    // customers
    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>>;
    async fn customer_exists(&self, id: CustomerId) -> Result<bool>;
    /// Case-insensitive; the column is stored lowercase.
    async fn customer_by_email(&self, email: &str) -> Result<Option<Customer>>;
    async fn customers(&self) -> Result<Vec<Customer>>;
    async fn update_customer(&self, customer: &Customer) -> Result<()>;

    // accounts
    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>>;
    async fn account_by_number(&self, number: &AccountNumber) -> Result<Option<Account>>;
    async fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>>;
    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool>;
    async fn active_accounts(&self) -> Result<Vec<Account>>;
    async fn interest_bearing_accounts(&self) -> Result<Vec<Account>>;
    /// Zero-balance Active accounts whose last activity predates `cutoff`.
    async fn inactive_accounts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>>;
    async fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>>;
    async fn low_balance_accounts(&self, threshold: Decimal) -> Result<Vec<Account>>;
    /// Compare-and-set flush used by jobs; all rows in one transaction.
    async fn update_accounts(&self, updates: &[AccountUpdate]) -> Result<()>;

    // transactions
    async fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>>;
    /// Inclusive range, ordered by timestamp ascending.
    async fn transactions_in_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
    /// Rows with `timestamp < before`, ordered ascending.
    async fn transactions_through(
        &self,
        account_id: AccountId,
        before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
    async fn transactions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>>;
    async fn recent_transactions(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
    async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()>;

    /// The unit-of-work write: aggregate mutations and outbox rows in one
    /// transaction, failing with [`crate::StoreError::Concurrency`] on any
    /// stale token.
    async fn commit(&self, commit: Commit) -> Result<()>;

    // outbox
    /// Unprocessed rows below the retry bound, occurred-on ascending.
    async fn pending_outbox(&self, limit: u32, max_retries: u32) -> Result<Vec<OutboxMessage>>;
    /// Persists a batch of row updates in one transaction.
    async fn save_outbox(&self, messages: &[OutboxMessage]) -> Result<()>;
    async fn dead_outbox(&self, max_retries: u32) -> Result<Vec<OutboxMessage>>;
    /// Operator action: resets the retry count so the row re-enters the
    /// queue. Returns false when the row is missing or already processed.
    async fn requeue_outbox(&self, id: Uuid) -> Result<bool>;
    async fn outbox_by_id(&self, id: Uuid) -> Result<Option<OutboxMessage>>;
}
