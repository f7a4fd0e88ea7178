use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::{CoreError, Result};
use crate::event::{AccountCreated, DomainEvent, InsufficientFunds, MoneyTransferred, PendingEvent};
use crate::transaction::Transaction;
use crate::value_object::{
    AccountId, AccountNumber, AccountStatus, AccountType, CustomerId, Money, TransactionId,
    TransactionType,
};
use uuid::Uuid;

/// Savings accounts allow this many withdrawals per calendar month.
pub const SAVINGS_MONTHLY_WITHDRAWAL_LIMIT: u32 = 6;

/// An account is moved to Inactive once it has seen no activity for this long.
const INACTIVITY_THRESHOLD_DAYS: i64 = 365;

/// The central aggregate root. Owns its transactions and queues domain
/// events until the unit of work commits them into the outbox.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub account_number: AccountNumber,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    balance: Money,
    pub date_opened: DateTime<Utc>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    /// Optimistic concurrency token, replaced on every committed update.
    pub row_version: Uuid,
    pub last_activity: DateTime<Utc>,
    status: AccountStatus,
    pub interest_bearing: bool,
    pub archived: bool,
    transactions: Vec<Transaction>,
    pending_events: Vec<PendingEvent>,
}

/// The persisted fields of an account, used by the storage layer to map
/// value objects to and from primitive columns.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub account_number: AccountNumber,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub balance: Money,
    pub date_opened: DateTime<Utc>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub row_version: Uuid,
    pub last_activity: DateTime<Utc>,
    pub status: AccountStatus,
    pub interest_bearing: bool,
    pub archived: bool,
}

impl Account {
    /// Opens a new account. The initial deposit must be non-negative; a
    /// positive one is recorded as the first transaction so derived figures
    /// such as the average daily balance stay consistent with the ledger.
    pub fn open(
        customer_id: CustomerId,
        account_number: AccountNumber,
        account_type: AccountType,
        initial_deposit: Money,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if initial_deposit.is_negative() {
            return Err(CoreError::validation("initial deposit cannot be negative"));
        }

        let id = AccountId::new();
        let mut account = Self {
            id,
            account_number: account_number.clone(),
            customer_id,
            account_type,
            balance: initial_deposit.clone(),
            date_opened: now,
            is_active: true,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            row_version: Uuid::new_v4(),
            last_activity: now,
            status: AccountStatus::Active,
            interest_bearing: account_type != AccountType::Checking,
            archived: false,
            transactions: Vec::new(),
            pending_events: Vec::new(),
        };

        if initial_deposit.is_positive() {
            account.transactions.push(Transaction::new(
                id,
                TransactionType::Deposit,
                initial_deposit.clone(),
                "Initial deposit",
                "",
                now,
            ));
        }

        account.raise(DomainEvent::AccountCreated(AccountCreated {
            account_id: id,
            account_number,
            customer_id,
            account_type,
            initial_deposit,
        }));

        Ok(account)
    }

    pub fn hydrate(snapshot: AccountSnapshot, transactions: Vec<Transaction>) -> Self {
        Self {
            id: snapshot.id,
            account_number: snapshot.account_number,
            customer_id: snapshot.customer_id,
            account_type: snapshot.account_type,
            balance: snapshot.balance,
            date_opened: snapshot.date_opened,
            is_active: snapshot.is_active,
            is_deleted: snapshot.is_deleted,
            deleted_at: snapshot.deleted_at,
            deleted_by: snapshot.deleted_by,
            row_version: snapshot.row_version,
            last_activity: snapshot.last_activity,
            status: snapshot.status,
            interest_bearing: snapshot.interest_bearing,
            archived: snapshot.archived,
            transactions,
            pending_events: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id,
            account_number: self.account_number.clone(),
            customer_id: self.customer_id,
            account_type: self.account_type,
            balance: self.balance.clone(),
            date_opened: self.date_opened,
            is_active: self.is_active,
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by.clone(),
            row_version: self.row_version,
            last_activity: self.last_activity,
            status: self.status,
            interest_bearing: self.interest_bearing,
            archived: self.archived,
        }
    }

    pub fn balance(&self) -> &Money {
        &self.balance
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_deleted && self.status == AccountStatus::Active
    }

    /// Events queued since the last commit, read-only.
    pub fn events(&self) -> &[PendingEvent] {
        &self.pending_events
    }

    /// Takes the queued events. Reserved for the unit of work; a failed
    /// commit puts them back through [`Account::restore_events`].
    pub fn drain_events(&mut self) -> Vec<PendingEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn restore_events(&mut self, mut events: Vec<PendingEvent>) {
        events.extend(self.pending_events.drain(..));
        self.pending_events = events;
    }

    pub fn deposit(
        &mut self,
        amount: Money,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        self.ensure_open()?;
        self.ensure_positive(&amount)?;
        self.ensure_currency(&amount)?;

        self.balance = self.balance.add(&amount)?;
        self.last_activity = now;

        let tx = Transaction::new(self.id, TransactionType::Deposit, amount, description, "", now);
        self.transactions.push(tx.clone());

        Ok(tx)
    }

    pub fn withdraw(
        &mut self,
        amount: Money,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        self.ensure_open()?;
        self.ensure_positive(&amount)?;
        self.ensure_currency(&amount)?;
        self.ensure_funds(&amount, "Withdrawal")?;

        if self.account_type == AccountType::Savings {
            let prior = self.withdrawals_in_month(now.year(), now.month());

            if prior + 1 > SAVINGS_MONTHLY_WITHDRAWAL_LIMIT {
                return Err(CoreError::WithdrawalLimit {
                    account_number: self.account_number.clone(),
                    limit: SAVINGS_MONTHLY_WITHDRAWAL_LIMIT,
                });
            }
        }

        self.balance = self.balance.sub(&amount)?;
        self.last_activity = now;

        let tx = Transaction::new(
            self.id,
            TransactionType::Withdrawal,
            amount,
            description,
            "",
            now,
        );
        self.transactions.push(tx.clone());

        Ok(tx)
    }

    /// Moves money to `dest` as one atomic in-memory mutation: a TransferOut
    /// on self and a TransferIn on dest sharing one reference. Persistence
    /// atomicity is the unit of work's responsibility.
    pub fn transfer_to(
        &mut self,
        dest: &mut Account,
        amount: Money,
        reference: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Transaction)> {
        if self.id == dest.id {
            return Err(CoreError::validation(
                "transfer requires two distinct accounts",
            ));
        }

        self.ensure_open()?;
        dest.ensure_open()?;
        self.ensure_positive(&amount)?;
        self.ensure_currency(&amount)?;

        if !self.balance.same_currency(dest.balance()) {
            return Err(CoreError::Validation(vec![format!(
                "currency mismatch: {} vs {}",
                self.balance.currency(),
                dest.balance.currency()
            )]));
        }

        self.ensure_funds(&amount, "Transfer")?;

        let transaction_id = TransactionId::new();
        let reference: String = reference.into();
        let reference = if reference.is_empty() {
            Transaction::generate_reference(transaction_id, now)
        } else {
            reference
        };
        let description: String = description.into();

        self.balance = self.balance.sub(&amount)?;
        dest.balance = dest.balance.add(&amount)?;
        self.last_activity = now;
        dest.last_activity = now;

        let out_tx = Transaction::new(
            self.id,
            TransactionType::TransferOut,
            amount.clone(),
            description.clone(),
            reference.clone(),
            now,
        );
        let in_tx = Transaction::new(
            dest.id,
            TransactionType::TransferIn,
            amount.clone(),
            description,
            reference.clone(),
            now,
        );

        self.transactions.push(out_tx.clone());
        dest.transactions.push(in_tx.clone());

        self.raise(DomainEvent::MoneyTransferred(MoneyTransferred {
            transaction_id,
            source_account_number: self.account_number.clone(),
            destination_account_number: dest.account_number.clone(),
            amount,
            reference,
            transfer_date: now,
        }));

        Ok((out_tx, in_tx))
    }

    /// Records an interest credit built by [`Transaction::interest_credit`],
    /// keeping the balance in step with the ledger.
    pub fn apply_interest(&mut self, tx: Transaction) -> Result<()> {
        if tx.tx_type != TransactionType::InterestCredit {
            return Err(CoreError::InvalidOperation(
                "apply_interest accepts only interest credits".to_owned(),
            ));
        }

        self.balance = self.balance.add(&tx.amount)?;
        self.last_activity = tx.timestamp;
        self.transactions.push(tx);

        Ok(())
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.balance.is_zero() {
            return Err(CoreError::InvalidOperation(format!(
                "account {} cannot be closed with balance {}",
                self.account_number, self.balance
            )));
        }

        self.status = AccountStatus::Closed;
        self.is_active = false;
        self.last_activity = now;

        Ok(())
    }

    pub fn mark_archived(&mut self) {
        self.archived = true;
        self.is_active = false;
        self.status = AccountStatus::Archived;
    }

    /// Applies the maintenance rules: an Active account whose last activity
    /// is older than a year becomes Inactive. Returns whether anything
    /// changed.
    pub fn update_status_based_on_rules(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == AccountStatus::Active
            && self.last_activity < now - Duration::days(INACTIVITY_THRESHOLD_DAYS)
        {
            self.status = AccountStatus::Inactive;
            self.is_active = false;
            return true;
        }

        false
    }

    pub fn update_last_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn set_interest_bearing(&mut self, interest_bearing: bool) {
        self.interest_bearing = interest_bearing;
    }

    pub fn soft_delete(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if !self.balance.is_zero() {
            return Err(CoreError::InvalidOperation(format!(
                "account {} cannot be deleted with balance {}",
                self.account_number, self.balance
            )));
        }

        self.is_deleted = true;
        self.is_active = false;
        self.deleted_at = Some(now);
        self.deleted_by = Some(by.into());

        Ok(())
    }

    fn withdrawals_in_month(&self, year: i32, month: u32) -> u32 {
        self.transactions
            .iter()
            .filter(|tx| {
                tx.tx_type == TransactionType::Withdrawal
                    && !tx.is_deleted
                    && tx.timestamp.year() == year
                    && tx.timestamp.month() == month
            })
            .count() as u32
    }

    fn raise(&mut self, event: DomainEvent) {
        self.pending_events.push(PendingEvent::new(event));
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(CoreError::InvalidOperation(format!(
                "account {} is not active",
                self.account_number
            )));
        }

        Ok(())
    }

    fn ensure_positive(&self, amount: &Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(CoreError::validation("amount must be greater than zero"));
        }

        Ok(())
    }

    fn ensure_currency(&self, amount: &Money) -> Result<()> {
        if !self.balance.same_currency(amount) {
            return Err(CoreError::Validation(vec![format!(
                "currency mismatch: {} vs {}",
                amount.currency(),
                self.balance.currency()
            )]));
        }

        Ok(())
    }

    /// Queues the InsufficientFunds event alongside the typed failure so a
    /// rejected debit still reaches downstream consumers through the outbox.
    fn ensure_funds(&mut self, amount: &Money, operation: &str) -> Result<()> {
        if amount.amount() > self.balance.amount() {
            self.raise(DomainEvent::InsufficientFunds(InsufficientFunds {
                account_number: self.account_number.clone(),
                requested_amount: amount.clone(),
                current_balance: self.balance.clone(),
                operation: operation.to_owned(),
            }));

            return Err(CoreError::InsufficientFunds {
                account_number: self.account_number.clone(),
                requested: amount.clone(),
                available: self.balance.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn ngn(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, "NGN").unwrap()
    }

    fn open_account(account_type: AccountType, initial: rust_decimal::Decimal) -> Account {
        Account::open(
            CustomerId::new(),
            AccountNumber::parse("0123456789").unwrap(),
            account_type,
            ngn(initial),
            Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn open_queues_account_created() {
        let account = open_account(AccountType::Savings, dec!(1000));

        assert_eq!(account.balance().amount(), dec!(1000));
        assert_eq!(account.events().len(), 1);
        assert!(matches!(
            account.events()[0].event,
            DomainEvent::AccountCreated(_)
        ));
        // the opening deposit is part of the ledger
        assert_eq!(account.transactions().len(), 1);
        assert_eq!(account.transactions()[0].tx_type, TransactionType::Deposit);
    }

    #[test]
    fn open_with_zero_deposit_has_no_opening_transaction() {
        let account = open_account(AccountType::Checking, dec!(0));
        assert!(account.transactions().is_empty());
    }

    #[test]
    fn open_rejects_negative_deposit() {
        let result = Account::open(
            CustomerId::new(),
            AccountNumber::parse("0123456789").unwrap(),
            AccountType::Checking,
            ngn(dec!(-1)),
            Utc::now(),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn withdraw_exact_balance_succeeds_one_minor_unit_more_fails() {
        let now = Utc.with_ymd_and_hms(2025, 11, 2, 10, 0, 0).unwrap();
        let mut account = open_account(AccountType::Checking, dec!(100));

        let mut over = account.clone();
        let err = over.withdraw(ngn(dec!(100.01)), "too much", now).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert_eq!(over.balance().amount(), dec!(100));
        // the rejection itself is queued for downstream consumers
        assert!(over
            .events()
            .iter()
            .any(|e| matches!(&e.event, DomainEvent::InsufficientFunds(f) if f.operation == "Withdrawal")));

        account.withdraw(ngn(dec!(100)), "all of it", now).unwrap();
        assert_eq!(account.balance().amount(), dec!(0));
    }

    #[test]
    fn savings_cap_allows_six_withdrawals_per_month() {
        let mut account = open_account(AccountType::Savings, dec!(1000));

        for day in 1..=6 {
            let when = Utc.with_ymd_and_hms(2025, 11, day, 12, 0, 0).unwrap();
            account.withdraw(ngn(dec!(10)), "spend", when).unwrap();
        }

        let seventh = Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap();
        let err = account.withdraw(ngn(dec!(10)), "spend", seventh).unwrap_err();
        assert!(matches!(err, CoreError::WithdrawalLimit { limit: 6, .. }));

        let next_month = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 1).unwrap();
        account.withdraw(ngn(dec!(10)), "spend", next_month).unwrap();
        assert_eq!(account.balance().amount(), dec!(930));
    }

    #[test]
    fn checking_accounts_have_no_withdrawal_cap() {
        let mut account = open_account(AccountType::Checking, dec!(1000));

        for day in 1..=10 {
            let when = Utc.with_ymd_and_hms(2025, 11, day, 12, 0, 0).unwrap();
            account.withdraw(ngn(dec!(10)), "spend", when).unwrap();
        }

        assert_eq!(account.balance().amount(), dec!(900));
    }

    #[test]
    fn transfer_moves_money_and_queues_event() {
        let now = Utc.with_ymd_and_hms(2025, 11, 5, 8, 0, 0).unwrap();
        let mut source = open_account(AccountType::Checking, dec!(1000));
        let mut dest = Account::open(
            CustomerId::new(),
            AccountNumber::parse("9876543210").unwrap(),
            AccountType::Checking,
            ngn(dec!(500)),
            now,
        )
        .unwrap();

        let (out_tx, in_tx) = source
            .transfer_to(&mut dest, ngn(dec!(200)), "R1", "x", now)
            .unwrap();

        assert_eq!(source.balance().amount(), dec!(800));
        assert_eq!(dest.balance().amount(), dec!(1100));
        assert_eq!(out_tx.tx_type, TransactionType::TransferOut);
        assert_eq!(in_tx.tx_type, TransactionType::TransferIn);
        assert_eq!(out_tx.reference, "R1");
        assert_eq!(in_tx.reference, "R1");

        let transferred = source
            .events()
            .iter()
            .find_map(|e| match &e.event {
                DomainEvent::MoneyTransferred(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(transferred.amount, ngn(dec!(200)));
        assert_eq!(transferred.reference, "R1");
    }

    #[test]
    fn transfer_generates_reference_when_empty() {
        let now = Utc.with_ymd_and_hms(2025, 11, 5, 8, 0, 0).unwrap();
        let mut source = open_account(AccountType::Checking, dec!(1000));
        let mut dest = Account::open(
            CustomerId::new(),
            AccountNumber::parse("9876543210").unwrap(),
            AccountType::Checking,
            ngn(dec!(0)),
            now,
        )
        .unwrap();

        let (out_tx, in_tx) = source
            .transfer_to(&mut dest, ngn(dec!(50)), "", "x", now)
            .unwrap();

        assert!(!out_tx.reference.is_empty());
        assert_eq!(out_tx.reference, in_tx.reference);
        assert!(out_tx.reference.starts_with("20251105080000-"));
    }

    #[test]
    fn transfer_shortfall_leaves_balances_untouched() {
        let now = Utc::now();
        let mut source = open_account(AccountType::Checking, dec!(100));
        let mut dest = Account::open(
            CustomerId::new(),
            AccountNumber::parse("9876543210").unwrap(),
            AccountType::Checking,
            ngn(dec!(500)),
            now,
        )
        .unwrap();

        let err = source
            .transfer_to(&mut dest, ngn(dec!(200)), "R1", "x", now)
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert_eq!(source.balance().amount(), dec!(100));
        assert_eq!(dest.balance().amount(), dec!(500));
        assert!(source
            .events()
            .iter()
            .any(|e| matches!(&e.event, DomainEvent::InsufficientFunds(f) if f.operation == "Transfer")));
        assert!(!source
            .events()
            .iter()
            .any(|e| matches!(&e.event, DomainEvent::MoneyTransferred(_))));
    }

    #[test]
    fn transfer_rejects_cross_currency_and_self() {
        let now = Utc::now();
        let mut source = open_account(AccountType::Checking, dec!(1000));
        let mut usd = Account::open(
            CustomerId::new(),
            AccountNumber::parse("9876543210").unwrap(),
            AccountType::Checking,
            Money::new(dec!(0), "USD").unwrap(),
            now,
        )
        .unwrap();

        let err = source
            .transfer_to(&mut usd, ngn(dec!(10)), "", "x", now)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let mut clone = source.clone();
        let err = source
            .transfer_to(&mut clone, ngn(dec!(10)), "", "x", now)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn inactive_account_rejects_debits() {
        let now = Utc::now();
        let mut account = open_account(AccountType::Checking, dec!(0));
        account.close(now).unwrap();

        let err = account.deposit(ngn(dec!(10)), "late", now).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn close_requires_zero_balance() {
        let now = Utc::now();
        let mut funded = open_account(AccountType::Checking, dec!(10));
        assert!(matches!(
            funded.close(now),
            Err(CoreError::InvalidOperation(_))
        ));

        let mut empty = open_account(AccountType::Checking, dec!(0));
        empty.close(now).unwrap();
        assert_eq!(empty.status(), AccountStatus::Closed);
        assert!(!empty.is_active);
    }

    #[test]
    fn status_rules_move_stale_active_accounts_to_inactive() {
        let opened = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut account = Account::open(
            CustomerId::new(),
            AccountNumber::parse("0123456789").unwrap(),
            AccountType::Checking,
            ngn(dec!(0)),
            opened,
        )
        .unwrap();

        let soon = opened + Duration::days(30);
        assert!(!account.update_status_based_on_rules(soon));
        assert_eq!(account.status(), AccountStatus::Active);

        let much_later = opened + Duration::days(400);
        assert!(account.update_status_based_on_rules(much_later));
        assert_eq!(account.status(), AccountStatus::Inactive);
    }

    #[test]
    fn drain_and_restore_events() {
        let mut account = open_account(AccountType::Checking, dec!(100));
        let drained = account.drain_events();
        assert_eq!(drained.len(), 1);
        assert!(account.events().is_empty());

        account.restore_events(drained.clone());
        assert_eq!(account.events(), drained.as_slice());
    }

    #[test]
    fn apply_interest_credits_balance() {
        let now = Utc::now();
        let mut account = open_account(AccountType::Savings, dec!(100));
        let credit =
            Transaction::interest_credit(account.id, ngn(dec!(1.23)), now, "monthly interest");

        account.apply_interest(credit).unwrap();
        assert_eq!(account.balance().amount(), dec!(101.23));

        let deposit = Transaction::new(
            account.id,
            TransactionType::Deposit,
            ngn(dec!(5)),
            "not interest",
            "",
            now,
        );
        assert!(account.apply_interest(deposit).is_err());
    }
}
