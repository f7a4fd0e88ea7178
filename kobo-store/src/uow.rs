use kobo_core::{Account, AccountSnapshot, Customer, PendingEvent, Transaction};
use uuid::Uuid;

use crate::error::Result;
use crate::outbox::OutboxMessage;
use crate::store::Store;

/// Everything one unit of work writes in a single database transaction.
#[derive(Debug, Default)]
pub struct Commit {
    pub customers: Vec<Customer>,
    pub customer_updates: Vec<Customer>,
    pub accounts: Vec<AccountSnapshot>,
    pub account_updates: Vec<AccountUpdate>,
    pub transactions: Vec<Transaction>,
    pub outbox: Vec<OutboxMessage>,
}

/// An account row rewrite guarded by its previous concurrency token.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub snapshot: AccountSnapshot,
    pub expected_version: Uuid,
}

impl AccountUpdate {
    /// Captures the loaded token as the compare-and-set expectation and
    /// stamps the aggregate with a fresh one for this write.
    pub fn capture(account: &mut Account) -> Self {
        let expected_version = account.row_version;
        account.row_version = Uuid::new_v4();

        Self {
            snapshot: account.snapshot(),
            expected_version,
        }
    }
}

/// Per-command scope that flushes aggregate mutations and their pending
/// events atomically. One unit of work per command execution, never shared.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    new_customers: Vec<Customer>,
    updated_customers: Vec<Customer>,
    new_accounts: Vec<Account>,
    updated_accounts: Vec<(Account, Uuid)>,
    new_transactions: Vec<Transaction>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_customer(&mut self, customer: Customer) {
        self.new_customers.push(customer);
    }

    pub fn update_customer(&mut self, customer: Customer) {
        self.updated_customers.push(customer);
    }

    /// Persists the account and every transaction it already owns (a brand
    /// new aggregate carries only new children).
    pub fn insert_account(&mut self, account: Account) {
        self.new_accounts.push(account);
    }

    /// Persists the account row only; new children go through
    /// [`UnitOfWork::insert_transaction`].
    pub fn update_account(&mut self, mut account: Account) {
        let expected = account.row_version;
        account.row_version = Uuid::new_v4();
        self.updated_accounts.push((account, expected));
    }

    pub fn insert_transaction(&mut self, transaction: Transaction) {
        self.new_transactions.push(transaction);
    }

    /// Aggregates tracked by this scope, in registration order.
    pub fn tracked_accounts(&self) -> impl Iterator<Item = &Account> {
        self.new_accounts
            .iter()
            .chain(self.updated_accounts.iter().map(|(a, _)| a))
    }

    /// Commits the scope: drains the tracked aggregates' pending events,
    /// serializes them into outbox rows and writes rows and mutations in one
    /// engine transaction. On success the scope is cleared and the committed
    /// events are returned for post-commit dispatch. On failure the drained
    /// events are restored onto the aggregates, which stay tracked.
    pub async fn commit(&mut self, store: &Store) -> Result<Vec<PendingEvent>> {
        let mut drained: Vec<Vec<PendingEvent>> = Vec::new();
        let mut events: Vec<PendingEvent> = Vec::new();

        for account in self
            .new_accounts
            .iter_mut()
            .chain(self.updated_accounts.iter_mut().map(|(a, _)| a))
        {
            let batch = account.drain_events();
            events.extend(batch.iter().cloned());
            drained.push(batch);
        }

        let outbox = match events
            .iter()
            .map(OutboxMessage::from_pending)
            .collect::<serde_json::Result<Vec<_>>>()
        {
            Ok(outbox) => outbox,
            Err(e) => {
                self.restore(drained);
                return Err(e.into());
            }
        };

        let mut transactions = self.new_transactions.clone();
        for account in &self.new_accounts {
            transactions.extend(account.transactions().iter().cloned());
        }

        let commit = Commit {
            customers: self.new_customers.clone(),
            customer_updates: self.updated_customers.clone(),
            accounts: self.new_accounts.iter().map(Account::snapshot).collect(),
            account_updates: self
                .updated_accounts
                .iter()
                .map(|(account, expected)| AccountUpdate {
                    snapshot: account.snapshot(),
                    expected_version: *expected,
                })
                .collect(),
            transactions,
            outbox,
        };

        if let Err(e) = store.commit(commit).await {
            self.restore(drained);
            return Err(e);
        }

        self.new_customers.clear();
        self.updated_customers.clear();
        self.new_accounts.clear();
        self.updated_accounts.clear();
        self.new_transactions.clear();

        Ok(events)
    }

    fn restore(&mut self, drained: Vec<Vec<PendingEvent>>) {
        for (account, batch) in self
            .new_accounts
            .iter_mut()
            .chain(self.updated_accounts.iter_mut().map(|(a, _)| a))
            .zip(drained)
        {
            account.restore_events(batch);
        }
    }
}
