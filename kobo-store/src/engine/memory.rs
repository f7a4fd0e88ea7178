use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kobo_core::{
    Account, AccountId, AccountNumber, AccountSnapshot, AccountStatus, Customer, CustomerId,
    Transaction, TransactionId,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::outbox::OutboxMessage;
use crate::store::Store;
use crate::uow::{AccountUpdate, Commit};

impl Store {
    /// A store over the in-memory engine, the backend every test runs on.
    pub fn in_memory() -> Self {
        Self::new(Memory::default())
    }
}

#[derive(Debug, Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<AccountId, AccountSnapshot>,
    transactions: Vec<Transaction>,
    outbox: Vec<OutboxMessage>,
}

/// Single-lock engine; `commit` is atomic by construction because every
/// validation and mutation happens under one write guard.
#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<State>>);

impl State {
    fn hydrate(&self, snapshot: &AccountSnapshot) -> Account {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.account_id == snapshot.id && !tx.is_deleted)
            .cloned()
            .collect();
        transactions.sort_by_key(|tx| tx.timestamp);

        Account::hydrate(snapshot.clone(), transactions)
    }

    fn visible_accounts(&self) -> impl Iterator<Item = &AccountSnapshot> {
        self.accounts.values().filter(|a| !a.is_deleted)
    }

    fn apply_update(&mut self, update: &AccountUpdate) -> Result<()> {
        let current = self
            .accounts
            .get(&update.snapshot.id)
            .ok_or(StoreError::Concurrency)?;

        if current.row_version != update.expected_version {
            return Err(StoreError::Concurrency);
        }

        self.accounts
            .insert(update.snapshot.id, update.snapshot.clone());

        Ok(())
    }
}

fn sorted(mut rows: Vec<Transaction>) -> Vec<Transaction> {
    rows.sort_by_key(|tx| tx.timestamp);
    rows
}

#[async_trait]
impl Engine for Memory {
    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        let state = self.0.read();
        Ok(state.customers.get(&id).filter(|c| !c.is_deleted).cloned())
    }

    async fn customer_exists(&self, id: CustomerId) -> Result<bool> {
        let state = self.0.read();
        Ok(state.customers.get(&id).is_some_and(|c| !c.is_deleted))
    }

    async fn customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let email = email.to_lowercase();
        let state = self.0.read();

        Ok(state
            .customers
            .values()
            .find(|c| !c.is_deleted && c.email() == email)
            .cloned())
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        let state = self.0.read();
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| !c.is_deleted)
            .cloned()
            .collect();
        customers.sort_by_key(|c| c.date_created);

        Ok(customers)
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let mut state = self.0.write();

        if !state.customers.contains_key(&customer.id) {
            return Err(StoreError::Any(anyhow!(
                "customer {} is not persisted",
                customer.id
            )));
        }

        state.customers.insert(customer.id, customer.clone());

        Ok(())
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.0.read();

        Ok(state
            .accounts
            .get(&id)
            .filter(|a| !a.is_deleted)
            .map(|snapshot| state.hydrate(snapshot)))
    }

    async fn account_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        let state = self.0.read();

        let result = state
            .visible_accounts()
            .find(|a| &a.account_number == number)
            .map(|snapshot| state.hydrate(snapshot));
        Ok(result)
    }

    async fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let state = self.0.read();
        let mut accounts: Vec<Account> = state
            .visible_accounts()
            .filter(|a| a.customer_id == customer_id)
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect();
        accounts.sort_by_key(|a| a.date_opened);

        Ok(accounts)
    }

    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool> {
        let state = self.0.read();
        let result = state.visible_accounts().any(|a| &a.account_number == number);
        Ok(result)
    }

    async fn active_accounts(&self) -> Result<Vec<Account>> {
        let state = self.0.read();

        Ok(state
            .visible_accounts()
            .filter(|a| a.is_active && a.status == AccountStatus::Active)
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect())
    }

    async fn interest_bearing_accounts(&self) -> Result<Vec<Account>> {
        let state = self.0.read();

        Ok(state
            .visible_accounts()
            .filter(|a| a.is_active && a.status == AccountStatus::Active && a.interest_bearing)
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect())
    }

    async fn inactive_accounts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let state = self.0.read();

        Ok(state
            .visible_accounts()
            .filter(|a| {
                a.status == AccountStatus::Active
                    && a.last_activity < cutoff
                    && a.balance.is_zero()
            })
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect())
    }

    async fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        let state = self.0.read();

        Ok(state
            .visible_accounts()
            .filter(|a| a.status == status)
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect())
    }

    async fn low_balance_accounts(&self, threshold: Decimal) -> Result<Vec<Account>> {
        let state = self.0.read();

        Ok(state
            .visible_accounts()
            .filter(|a| a.is_active && a.balance.amount() < threshold)
            .map(|s| Account::hydrate(s.clone(), Vec::new()))
            .collect())
    }

    async fn update_accounts(&self, updates: &[AccountUpdate]) -> Result<()> {
        let mut state = self.0.write();

        for update in updates {
            let current = state
                .accounts
                .get(&update.snapshot.id)
                .ok_or(StoreError::Concurrency)?;

            if current.row_version != update.expected_version {
                return Err(StoreError::Concurrency);
            }
        }

        for update in updates {
            state.apply_update(update)?;
        }

        Ok(())
    }

    async fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.0.read();

        Ok(state
            .transactions
            .iter()
            .find(|tx| tx.id == id && !tx.is_deleted)
            .cloned())
    }

    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| tx.account_id == account_id && !tx.is_deleted)
                .cloned()
                .collect(),
        ))
    }

    async fn transactions_in_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| {
                    tx.account_id == account_id
                        && !tx.is_deleted
                        && tx.timestamp >= start
                        && tx.timestamp <= end
                })
                .cloned()
                .collect(),
        ))
    }

    async fn transactions_through(
        &self,
        account_id: AccountId,
        before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| {
                    tx.account_id == account_id && !tx.is_deleted && tx.timestamp < before
                })
                .cloned()
                .collect(),
        ))
    }

    async fn transactions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| !tx.is_deleted && tx.timestamp < cutoff)
                .cloned()
                .collect(),
        ))
    }

    async fn recent_transactions(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| {
                    tx.account_id == account_id && !tx.is_deleted && tx.timestamp >= since
                })
                .cloned()
                .collect(),
        ))
    }

    async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.0.read();

        Ok(sorted(
            state
                .transactions
                .iter()
                .filter(|tx| !tx.is_deleted && tx.timestamp >= start && tx.timestamp <= end)
                .cloned()
                .collect(),
        ))
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let mut state = self.0.write();
        state.transactions.extend_from_slice(transactions);

        Ok(())
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut state = self.0.write();

        // validate before touching anything so a failed commit applies none
        // of the batch
        for update in &commit.account_updates {
            let current = state
                .accounts
                .get(&update.snapshot.id)
                .ok_or(StoreError::Concurrency)?;

            if current.row_version != update.expected_version {
                return Err(StoreError::Concurrency);
            }
        }

        for customer in &commit.customers {
            let duplicate = state
                .customers
                .values()
                .any(|c| !c.is_deleted && c.email() == customer.email());

            if duplicate {
                return Err(StoreError::Any(anyhow!(
                    "email `{}` is already registered",
                    customer.email()
                )));
            }
        }

        for account in &commit.accounts {
            let duplicate = state
                .visible_accounts()
                .any(|a| a.account_number == account.account_number);

            if duplicate {
                return Err(StoreError::Any(anyhow!(
                    "account number `{}` is already assigned",
                    account.account_number
                )));
            }
        }

        for customer in commit.customers {
            state.customers.insert(customer.id, customer);
        }

        for customer in commit.customer_updates {
            state.customers.insert(customer.id, customer);
        }

        for account in commit.accounts {
            state.accounts.insert(account.id, account);
        }

        for update in &commit.account_updates {
            state.apply_update(update)?;
        }

        state.transactions.extend(commit.transactions);
        state.outbox.extend(commit.outbox);

        Ok(())
    }

    async fn pending_outbox(&self, limit: u32, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        let state = self.0.read();
        let mut rows: Vec<OutboxMessage> = state
            .outbox
            .iter()
            .filter(|m| m.processed_on.is_none() && m.retry_count < max_retries as i32)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.occurred_on);
        rows.truncate(limit as usize);

        Ok(rows)
    }

    async fn save_outbox(&self, messages: &[OutboxMessage]) -> Result<()> {
        let mut state = self.0.write();

        for message in messages {
            match state.outbox.iter_mut().find(|m| m.id == message.id) {
                Some(row) => *row = message.clone(),
                None => state.outbox.push(message.clone()),
            }
        }

        Ok(())
    }

    async fn dead_outbox(&self, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        let state = self.0.read();
        let mut rows: Vec<OutboxMessage> = state
            .outbox
            .iter()
            .filter(|m| m.processed_on.is_none() && m.retry_count >= max_retries as i32)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.occurred_on);

        Ok(rows)
    }

    async fn requeue_outbox(&self, id: Uuid) -> Result<bool> {
        let mut state = self.0.write();

        match state
            .outbox
            .iter_mut()
            .find(|m| m.id == id && m.processed_on.is_none())
        {
            Some(row) => {
                row.retry_count = 0;
                row.error = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn outbox_by_id(&self, id: Uuid) -> Result<Option<OutboxMessage>> {
        let state = self.0.read();
        Ok(state.outbox.iter().find(|m| m.id == id).cloned())
    }
}
