use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::value_object::{AccountId, AccountNumber, AccountType, CustomerId, Money, TransactionId};

/// Event raised when a new account is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub initial_deposit: Money,
}

/// Event raised when a transfer between two accounts succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyTransferred {
    pub transaction_id: TransactionId,
    pub source_account_number: AccountNumber,
    pub destination_account_number: AccountNumber,
    pub amount: Money,
    pub reference: String,
    pub transfer_date: DateTime<Utc>,
}

/// Event raised when an operation is rejected for lack of funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientFunds {
    pub account_number: AccountNumber,
    pub requested_amount: Money,
    pub current_balance: Money,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    AccountCreated(AccountCreated),
    MoneyTransferred(MoneyTransferred),
    InsufficientFunds(InsufficientFunds),
}

impl DomainEvent {
    /// Stable type tag persisted alongside the payload. The outbox relay
    /// resolves the concrete variant from this tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountCreated(_) => "AccountCreated",
            Self::MoneyTransferred(_) => "MoneyTransferred",
            Self::InsufficientFunds(_) => "InsufficientFunds",
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<Value> {
        match self {
            Self::AccountCreated(e) => serde_json::to_value(e),
            Self::MoneyTransferred(e) => serde_json::to_value(e),
            Self::InsufficientFunds(e) => serde_json::to_value(e),
        }
    }

    /// Resolves a persisted payload by its type tag. Unknown tags yield
    /// `Ok(None)` so the relay can retire them instead of blocking the queue.
    pub fn from_payload(name: &str, payload: &Value) -> serde_json::Result<Option<Self>> {
        let event = match name {
            "AccountCreated" => Self::AccountCreated(serde_json::from_value(payload.clone())?),
            "MoneyTransferred" => Self::MoneyTransferred(serde_json::from_value(payload.clone())?),
            "InsufficientFunds" => Self::InsufficientFunds(serde_json::from_value(payload.clone())?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

/// In-memory envelope queued on an aggregate until the unit of work commits
/// it into the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub id: Uuid,
    pub occurred_on: DateTime<Utc>,
    pub event: DomainEvent,
}

impl PendingEvent {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_on: Utc::now(),
            event,
        }
    }
}
