use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kobo_core::{AccountId, CoreError, Transaction, TransactionId, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::Query;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GetTransactionHistory {
    pub account_id: AccountId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDto {
    pub id: TransactionId,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub reference: String,
}

impl From<&Transaction> for TransactionDto {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            tx_type: tx.tx_type,
            amount: tx.amount.amount(),
            currency: tx.amount.currency().to_owned(),
            description: tx.description.clone(),
            timestamp: tx.timestamp,
            reference: tx.reference.clone(),
        }
    }
}

/// Returns the inclusive range ordered by timestamp ascending; streaming
/// bindings iterate this sequence and honor cancellation at each yield.
#[async_trait]
impl Query for GetTransactionHistory {
    type Output = Vec<TransactionDto>;

    async fn fetch(&self, ctx: &AppContext) -> Result<Vec<TransactionDto>, CoreError> {
        if self.start > self.end {
            return Err(CoreError::validation("start must not be after end"));
        }

        if ctx.store.account_by_id(self.account_id).await?.is_none() {
            return Err(CoreError::not_found("account", self.account_id));
        }

        let transactions = ctx
            .store
            .transactions_in_range(self.account_id, self.start, self.end)
            .await?;

        Ok(transactions.iter().map(TransactionDto::from).collect())
    }
}
