use std::fmt;

use parse_display::{Display, FromStr};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(CustomerId);
entity_id!(AccountId);
entity_id!(TransactionId);

/// A 10-digit numeric account number, globally unique and immutable once
/// assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.len() != 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::Validation(vec![format!(
                "account number `{value}` must be exactly 10 digits"
            )]));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount paired with its 3-letter currency code. Balances never go
/// negative; transaction amounts are always carried positive, the
/// transaction type gives the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Result<Self> {
        let currency: String = currency.into();

        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(CoreError::Validation(vec![format!(
                "currency `{currency}` must be a 3-letter code"
            )]));
        }

        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        })
    }

    pub fn zero(currency: impl Into<String>) -> Result<Self> {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    pub fn add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;

        Ok(Self {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn sub(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;

        Ok(Self {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if !self.same_currency(other) {
            return Err(CoreError::Validation(vec![format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )]));
        }

        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, FromStr, Serialize, Deserialize,
)]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    FixedDeposit,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, FromStr, Serialize, Deserialize,
)]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Closed,
    Suspended,
    Archived,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, FromStr, Serialize, Deserialize,
)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    TransferIn,
    TransferOut,
    InterestCredit,
}

impl TransactionType {
    /// Whether the transaction increases the carrying account's balance.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Deposit | Self::TransferIn | Self::InterestCredit
        )
    }
}
