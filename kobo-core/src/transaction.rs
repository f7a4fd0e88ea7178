use chrono::{DateTime, Utc};

use crate::value_object::{AccountId, Money, TransactionId, TransactionType};

/// Append-only child of an account. Never mutated after creation except for
/// soft deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub reference: String,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Transaction {
    /// An empty reference is replaced by the generated
    /// `YYYYMMDDhhmmss-<first-8-of-id>` form; a caller-supplied reference is
    /// stored verbatim.
    pub fn new(
        account_id: AccountId,
        tx_type: TransactionType,
        amount: Money,
        description: impl Into<String>,
        reference: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = TransactionId::new();
        let reference: String = reference.into();
        let reference = if reference.is_empty() {
            Self::generate_reference(id, timestamp)
        } else {
            reference
        };

        Self {
            id,
            account_id,
            tx_type,
            amount,
            description: description.into(),
            timestamp,
            reference,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Builds an interest credit with an `INT-YYYYMMDD-<8 hex>` reference.
    /// Callers are responsible for also crediting the owning account.
    pub fn interest_credit(
        account_id: AccountId,
        amount: Money,
        when: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Self {
        let id = TransactionId::new();
        let suffix = id.as_uuid().simple().to_string()[..8].to_ascii_uppercase();
        let reference = format!("INT-{}-{}", when.format("%Y%m%d"), suffix);

        Self {
            id,
            account_id,
            tx_type: TransactionType::InterestCredit,
            amount,
            description: description.into(),
            timestamp: when,
            reference,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn generate_reference(id: TransactionId, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            timestamp.format("%Y%m%d%H%M%S"),
            &id.as_uuid().simple().to_string()[..8]
        )
    }

    pub fn soft_delete(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.deleted_by = Some(by.into());
    }
}
