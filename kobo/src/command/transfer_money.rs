use async_trait::async_trait;
use chrono::Utc;
use kobo_core::{AccountNumber, CoreError, Money};
use kobo_store::UnitOfWork;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::{Command, CommandOutcome};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferMoney {
    #[validate(length(equal = 10, message = "source account number must be 10 digits"))]
    pub source_account_number: String,

    #[validate(length(equal = 10, message = "destination account number must be 10 digits"))]
    pub destination_account_number: String,

    pub amount: Decimal,

    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,

    pub reference: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub reference: String,
}

#[async_trait]
impl Command for TransferMoney {
    type Output = TransferReceipt;

    async fn handle(&self, ctx: &AppContext) -> Result<CommandOutcome<TransferReceipt>, CoreError> {
        let source_number = AccountNumber::parse(&self.source_account_number)?;
        let destination_number = AccountNumber::parse(&self.destination_account_number)?;

        let mut source = ctx
            .store
            .account_by_number(&source_number)
            .await?
            .ok_or_else(|| CoreError::not_found("account", &source_number))?;
        let mut destination = ctx
            .store
            .account_by_number(&destination_number)
            .await?
            .ok_or_else(|| CoreError::not_found("account", &destination_number))?;

        let amount = Money::new(self.amount, &self.currency)?;
        let now = Utc::now();

        match source.transfer_to(&mut destination, amount, &self.reference, &self.description, now)
        {
            Ok((out_tx, in_tx)) => {
                let receipt = TransferReceipt {
                    reference: out_tx.reference.clone(),
                };

                let mut uow = UnitOfWork::new();
                uow.update_account(source);
                uow.update_account(destination);
                uow.insert_transaction(out_tx);
                uow.insert_transaction(in_tx);
                // a stale row version surfaces as Conflict, which the caller
                // may retry
                let events = uow.commit(&ctx.store).await?;

                Ok(CommandOutcome::with_events(receipt, events))
            }
            Err(err @ CoreError::InsufficientFunds { .. }) => {
                // balances untouched; the queued InsufficientFunds event is
                // still written through the outbox
                let mut uow = UnitOfWork::new();
                uow.update_account(source);
                uow.commit(&ctx.store).await?;

                Err(err)
            }
            Err(other) => Err(other),
        }
    }
}
