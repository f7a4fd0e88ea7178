use async_trait::async_trait;
use chrono::Utc;
use kobo_core::{AccountNumber, CoreError, Money, TransactionId};
use kobo_store::UnitOfWork;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::{Command, CommandOutcome};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WithdrawMoney {
    #[validate(length(equal = 10, message = "account number must be 10 digits"))]
    pub account_number: String,

    pub amount: Decimal,

    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,

    pub description: String,
}

#[async_trait]
impl Command for WithdrawMoney {
    type Output = TransactionId;

    async fn handle(&self, ctx: &AppContext) -> Result<CommandOutcome<TransactionId>, CoreError> {
        let number = AccountNumber::parse(&self.account_number)?;
        let mut account = ctx
            .store
            .account_by_number(&number)
            .await?
            .ok_or_else(|| CoreError::not_found("account", &number))?;

        let amount = Money::new(self.amount, &self.currency)?;

        match account.withdraw(amount, &self.description, Utc::now()) {
            Ok(tx) => {
                let tx_id = tx.id;
                let mut uow = UnitOfWork::new();
                uow.update_account(account);
                uow.insert_transaction(tx);
                let events = uow.commit(&ctx.store).await?;

                Ok(CommandOutcome::with_events(tx_id, events))
            }
            // the rejection is queued on the aggregate; persist it so the
            // relay still tells downstream consumers about the shortfall
            Err(err @ CoreError::InsufficientFunds { .. }) => {
                let mut uow = UnitOfWork::new();
                uow.update_account(account);
                uow.commit(&ctx.store).await?;

                Err(err)
            }
            Err(other) => Err(other),
        }
    }
}
