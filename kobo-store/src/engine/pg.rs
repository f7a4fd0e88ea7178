use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kobo_core::{
    Account, AccountId, AccountNumber, AccountSnapshot, AccountStatus, Customer, CustomerId, Money,
    Transaction, TransactionId,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::outbox::OutboxMessage;
use crate::store::Store;
use crate::uow::{AccountUpdate, Commit};

const INSERT_CHUNK: usize = 100;

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

impl Store {
    pub fn pg(pool: &PgPool) -> Self {
        Self::new(Pg::new(pool))
    }
}

#[derive(Debug, Clone)]
pub struct Pg {
    pool: PgPool,
}

impl Pg {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    address: String,
    date_of_birth: NaiveDate,
    bvn: String,
    credit_score: i32,
    email_opt_in: bool,
    date_created: DateTime<Utc>,
    is_active: bool,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    account_number: String,
    customer_id: Uuid,
    #[sqlx(rename = "type")]
    account_type: String,
    balance_amount: Decimal,
    balance_currency: String,
    date_opened: DateTime<Utc>,
    is_active: bool,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
    row_version: Uuid,
    last_activity: DateTime<Utc>,
    status: String,
    is_interest_bearing: bool,
    is_archived: bool,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    #[sqlx(rename = "type")]
    tx_type: String,
    amount_amount: Decimal,
    amount_currency: String,
    description: String,
    timestamp: DateTime<Utc>,
    reference: String,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    name: String,
    content: serde_json::Value,
    occurred_on: DateTime<Utc>,
    processed_on: Option<DateTime<Utc>>,
    retry_count: i32,
    error: Option<String>,
}

fn customer_from_row(row: CustomerRow) -> Customer {
    Customer::hydrate(
        row.id.into(),
        row.first_name,
        row.last_name,
        row.email,
        row.phone,
        row.address,
        row.date_of_birth,
        row.bvn,
        row.credit_score,
        row.email_opt_in,
        row.date_created,
        row.is_active,
        row.is_deleted,
        row.deleted_at,
        row.deleted_by,
    )
}

fn snapshot_from_row(row: AccountRow) -> Result<AccountSnapshot> {
    Ok(AccountSnapshot {
        id: row.id.into(),
        account_number: AccountNumber::parse(row.account_number)?,
        customer_id: row.customer_id.into(),
        account_type: row
            .account_type
            .parse()
            .map_err(|e| anyhow!("invalid account type: {e}"))?,
        balance: Money::new(row.balance_amount, row.balance_currency)?,
        date_opened: row.date_opened,
        is_active: row.is_active,
        is_deleted: row.is_deleted,
        deleted_at: row.deleted_at,
        deleted_by: row.deleted_by,
        row_version: row.row_version,
        last_activity: row.last_activity,
        status: row
            .status
            .parse()
            .map_err(|e| anyhow!("invalid account status: {e}"))?,
        interest_bearing: row.is_interest_bearing,
        archived: row.is_archived,
    })
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.id.into(),
        account_id: row.account_id.into(),
        tx_type: row
            .tx_type
            .parse()
            .map_err(|e| anyhow!("invalid transaction type: {e}"))?,
        amount: Money::new(row.amount_amount, row.amount_currency)?,
        description: row.description,
        timestamp: row.timestamp,
        reference: row.reference,
        is_deleted: row.is_deleted,
        deleted_at: row.deleted_at,
        deleted_by: row.deleted_by,
    })
}

fn outbox_from_row(row: OutboxRow) -> OutboxMessage {
    OutboxMessage {
        id: row.id,
        name: row.name,
        content: row.content,
        occurred_on: row.occurred_on,
        processed_on: row.processed_on,
        retry_count: row.retry_count,
        error: row.error,
    }
}

const SELECT_CUSTOMER: &str = "SELECT * FROM customers WHERE is_deleted = FALSE";
const SELECT_ACCOUNT: &str = "SELECT * FROM accounts WHERE is_deleted = FALSE";
const SELECT_TRANSACTION: &str = "SELECT * FROM transactions WHERE is_deleted = FALSE";

impl Pg {
    async fn account_rows(&self, filter: &str) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} {filter}"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Ok(Account::hydrate(snapshot_from_row(row)?, Vec::new())))
            .collect()
    }

    async fn load_account(&self, row: AccountRow) -> Result<Account> {
        let snapshot = snapshot_from_row(row)?;
        let transactions = self.transactions(snapshot.id).await?;

        Ok(Account::hydrate(snapshot, transactions))
    }

    async fn transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND account_id = $1 ORDER BY timestamp ASC"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }
}

async fn insert_customers(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    customers: &[Customer],
) -> Result<()> {
    for customer in customers {
        sqlx::query(
            r#"
            INSERT INTO customers
              (id, first_name, last_name, email, phone, address, date_of_birth,
               bvn, credit_score, email_opt_in, date_created, is_active,
               is_deleted, deleted_at, deleted_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.email())
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.date_of_birth)
        .bind(&customer.bvn)
        .bind(customer.credit_score)
        .bind(customer.email_opt_in)
        .bind(customer.date_created)
        .bind(customer.is_active)
        .bind(customer.is_deleted)
        .bind(customer.deleted_at)
        .bind(&customer.deleted_by)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn update_customers(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    customers: &[Customer],
) -> Result<()> {
    for customer in customers {
        sqlx::query(
            r#"
            UPDATE customers
            SET first_name = $2, last_name = $3, email = $4, phone = $5,
                address = $6, credit_score = $7, email_opt_in = $8,
                is_active = $9, is_deleted = $10, deleted_at = $11,
                deleted_by = $12
            WHERE id = $1
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.email())
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.credit_score)
        .bind(customer.email_opt_in)
        .bind(customer.is_active)
        .bind(customer.is_deleted)
        .bind(customer.deleted_at)
        .bind(&customer.deleted_by)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn insert_accounts(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    accounts: &[AccountSnapshot],
) -> Result<()> {
    for account in accounts {
        sqlx::query(
            r#"
            INSERT INTO accounts
              (id, account_number, customer_id, type, balance_amount,
               balance_currency, date_opened, is_active, is_deleted,
               deleted_at, deleted_by, row_version, last_activity, status,
               is_interest_bearing, is_archived)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.account_number.as_str())
        .bind(account.customer_id.as_uuid())
        .bind(account.account_type.to_string())
        .bind(account.balance.amount())
        .bind(account.balance.currency())
        .bind(account.date_opened)
        .bind(account.is_active)
        .bind(account.is_deleted)
        .bind(account.deleted_at)
        .bind(&account.deleted_by)
        .bind(account.row_version)
        .bind(account.last_activity)
        .bind(account.status.to_string())
        .bind(account.interest_bearing)
        .bind(account.archived)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// CAS rewrite of the mutable account columns; zero affected rows means a
/// stale token.
async fn apply_account_updates(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    updates: &[AccountUpdate],
) -> Result<()> {
    for update in updates {
        let account = &update.snapshot;
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_amount = $3, balance_currency = $4, is_active = $5,
                is_deleted = $6, deleted_at = $7, deleted_by = $8,
                row_version = $9, last_activity = $10, status = $11,
                is_interest_bearing = $12, is_archived = $13
            WHERE id = $1 AND row_version = $2
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(update.expected_version)
        .bind(account.balance.amount())
        .bind(account.balance.currency())
        .bind(account.is_active)
        .bind(account.is_deleted)
        .bind(account.deleted_at)
        .bind(&account.deleted_by)
        .bind(account.row_version)
        .bind(account.last_activity)
        .bind(account.status.to_string())
        .bind(account.interest_bearing)
        .bind(account.archived)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Concurrency);
        }
    }

    Ok(())
}

async fn insert_transaction_rows(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    transactions: &[Transaction],
) -> Result<()> {
    for chunk in transactions.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO transactions (id, account_id, type, amount_amount, \
             amount_currency, description, timestamp, reference, is_deleted, \
             deleted_at, deleted_by) ",
        );

        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.id.as_uuid())
                .push_bind(row.account_id.as_uuid())
                .push_bind(row.tx_type.to_string())
                .push_bind(row.amount.amount())
                .push_bind(row.amount.currency().to_owned())
                .push_bind(row.description.clone())
                .push_bind(row.timestamp)
                .push_bind(row.reference.clone())
                .push_bind(row.is_deleted)
                .push_bind(row.deleted_at)
                .push_bind(row.deleted_by.clone());
        });

        builder.build().execute(&mut **tx).await?;
    }

    Ok(())
}

async fn insert_outbox_rows(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    messages: &[OutboxMessage],
) -> Result<()> {
    for chunk in messages.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO outbox_messages (id, type, content, occurred_on, \
             processed_on, retry_count, error) ",
        );

        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.name.clone())
                .push_bind(row.content.clone())
                .push_bind(row.occurred_on)
                .push_bind(row.processed_on)
                .push_bind(row.retry_count)
                .push_bind(row.error.clone());
        });

        builder.build().execute(&mut **tx).await?;
    }

    Ok(())
}

#[async_trait]
impl Engine for Pg {
    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!("{SELECT_CUSTOMER} AND id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(customer_from_row))
    }

    async fn customer_exists(&self, id: CustomerId) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE is_deleted = FALSE AND id = $1)",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "{SELECT_CUSTOMER} AND email = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(customer_from_row))
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "{SELECT_CUSTOMER} ORDER BY date_created ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(customer_from_row).collect())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_customers(&mut tx, std::slice::from_ref(customer)).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} AND id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_account(row).await?)),
            None => Ok(None),
        }
    }

    async fn account_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        let row =
            sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} AND account_number = $1"))
                .bind(number.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.load_account(row).await?)),
            None => Ok(None),
        }
    }

    async fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "{SELECT_ACCOUNT} AND customer_id = $1 ORDER BY date_opened ASC"
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(Account::hydrate(snapshot_from_row(row)?, Vec::new())))
            .collect()
    }

    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE is_deleted = FALSE AND account_number = $1)",
        )
        .bind(number.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn active_accounts(&self) -> Result<Vec<Account>> {
        self.account_rows("AND is_active = TRUE AND status = 'Active'")
            .await
    }

    async fn interest_bearing_accounts(&self) -> Result<Vec<Account>> {
        self.account_rows(
            "AND is_active = TRUE AND status = 'Active' AND is_interest_bearing = TRUE",
        )
        .await
    }

    async fn inactive_accounts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "{SELECT_ACCOUNT} AND status = 'Active' AND last_activity < $1 AND balance_amount = 0"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(Account::hydrate(snapshot_from_row(row)?, Vec::new())))
            .collect()
    }

    async fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} AND status = $1"))
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Ok(Account::hydrate(snapshot_from_row(row)?, Vec::new())))
            .collect()
    }

    async fn low_balance_accounts(&self, threshold: Decimal) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "{SELECT_ACCOUNT} AND is_active = TRUE AND balance_amount < $1"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(Account::hydrate(snapshot_from_row(row)?, Vec::new())))
            .collect()
    }

    async fn update_accounts(&self, updates: &[AccountUpdate]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = apply_account_updates(&mut tx, updates).await {
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_TRANSACTION} AND id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(transaction_from_row).transpose()
    }

    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.transactions(account_id).await
    }

    async fn transactions_in_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND account_id = $1 AND timestamp >= $2 AND timestamp <= $3 \
             ORDER BY timestamp ASC"
        ))
        .bind(account_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn transactions_through(
        &self,
        account_id: AccountId,
        before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND account_id = $1 AND timestamp < $2 ORDER BY timestamp ASC"
        ))
        .bind(account_id.as_uuid())
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn transactions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND timestamp < $1 ORDER BY timestamp ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn recent_transactions(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND account_id = $1 AND timestamp >= $2 ORDER BY timestamp ASC"
        ))
        .bind(account_id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} AND timestamp >= $1 AND timestamp <= $2 ORDER BY timestamp ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        insert_transaction_rows(&mut tx, transactions).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_customers(&mut tx, &commit.customers).await?;
        update_customers(&mut tx, &commit.customer_updates).await?;
        insert_accounts(&mut tx, &commit.accounts).await?;

        if let Err(e) = apply_account_updates(&mut tx, &commit.account_updates).await {
            tx.rollback().await?;
            return Err(e);
        }

        if !commit.transactions.is_empty() {
            insert_transaction_rows(&mut tx, &commit.transactions).await?;
        }

        if !commit.outbox.is_empty() {
            insert_outbox_rows(&mut tx, &commit.outbox).await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn pending_outbox(&self, limit: u32, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT * FROM outbox_messages \
             WHERE processed_on IS NULL AND retry_count < $1 \
             ORDER BY occurred_on ASC LIMIT $2",
        )
        .bind(max_retries as i32)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(outbox_from_row).collect())
    }

    async fn save_outbox(&self, messages: &[OutboxMessage]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for message in messages {
            sqlx::query(
                "UPDATE outbox_messages \
                 SET processed_on = $2, retry_count = $3, error = $4 \
                 WHERE id = $1",
            )
            .bind(message.id)
            .bind(message.processed_on)
            .bind(message.retry_count)
            .bind(&message.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn dead_outbox(&self, max_retries: u32) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT * FROM outbox_messages \
             WHERE processed_on IS NULL AND retry_count >= $1 \
             ORDER BY occurred_on ASC",
        )
        .bind(max_retries as i32)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(outbox_from_row).collect())
    }

    async fn requeue_outbox(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE outbox_messages SET retry_count = 0, error = NULL \
             WHERE id = $1 AND processed_on IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn outbox_by_id(&self, id: Uuid) -> Result<Option<OutboxMessage>> {
        let row = sqlx::query_as::<_, OutboxRow>("SELECT * FROM outbox_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(outbox_from_row))
    }
}
