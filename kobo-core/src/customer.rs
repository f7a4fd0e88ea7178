use chrono::{DateTime, NaiveDate, Utc};

use crate::account::Account;
use crate::error::{CoreError, Result};
use crate::value_object::CustomerId;

/// Identity of a person. Owns its accounts by id; the collection is loaded
/// by the repository only when an operation needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub bvn: String,
    pub credit_score: i32,
    pub email_opt_in: bool,
    pub date_created: DateTime<Utc>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Customer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        date_of_birth: NaiveDate,
        bvn: impl Into<String>,
        credit_score: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CustomerId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into().to_lowercase(),
            phone: phone.into(),
            address: address.into(),
            date_of_birth,
            bvn: bvn.into(),
            credit_score,
            email_opt_in: true,
            date_created: now,
            is_active: true,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Storage-layer hydration; the email is already normalized in the row.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: CustomerId,
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
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            email,
            phone,
            address,
            date_of_birth,
            bvn,
            credit_score,
            email_opt_in,
            date_created,
            is_active,
            is_deleted,
            deleted_at,
            deleted_by,
        }
    }

    /// Globally unique, compared case-insensitively; stored lowercase.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn update_contact(&mut self, phone: impl Into<String>, address: impl Into<String>) {
        self.phone = phone.into();
        self.address = address.into();
    }

    pub fn set_email_opt_in(&mut self, opt_in: bool) {
        self.email_opt_in = opt_in;
    }

    /// A customer cannot be deactivated while any owned account still holds
    /// a balance.
    pub fn deactivate(&mut self, accounts: &[Account]) -> Result<()> {
        self.ensure_no_funded_accounts(accounts)?;
        self.is_active = false;

        Ok(())
    }

    pub fn soft_delete(
        &mut self,
        by: impl Into<String>,
        accounts: &[Account],
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_no_funded_accounts(accounts)?;
        self.is_active = false;
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.deleted_by = Some(by.into());

        Ok(())
    }

    fn ensure_no_funded_accounts(&self, accounts: &[Account]) -> Result<()> {
        if let Some(funded) = accounts
            .iter()
            .find(|a| a.customer_id == self.id && !a.balance().is_zero())
        {
            return Err(CoreError::InvalidOperation(format!(
                "customer {} still holds {} on account {}",
                self.id,
                funded.balance(),
                funded.account_number
            )));
        }

        Ok(())
    }
}
