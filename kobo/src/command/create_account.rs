use async_trait::async_trait;
use chrono::Utc;
use kobo_core::{Account, AccountId, AccountNumber, AccountType, CoreError, CustomerId, Money};
use kobo_store::UnitOfWork;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::{Command, CommandOutcome};

/// Random candidates tried before giving up on a unique account number.
const ACCOUNT_NUMBER_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccount {
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub initial_deposit: Decimal,

    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,
}

#[async_trait]
impl Command for CreateAccount {
    type Output = AccountId;

    async fn handle(&self, ctx: &AppContext) -> Result<CommandOutcome<AccountId>, CoreError> {
        let customer = ctx
            .store
            .customer_by_id(self.customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("customer", self.customer_id))?;

        if !customer.is_active {
            return Err(CoreError::InvalidOperation(format!(
                "customer {} is not active",
                customer.id
            )));
        }

        let initial_deposit = Money::new(self.initial_deposit, &self.currency)?;
        let account_number = allocate_account_number(ctx).await?;

        let account = Account::open(
            customer.id,
            account_number,
            self.account_type,
            initial_deposit,
            Utc::now(),
        )?;
        let id = account.id;

        let mut uow = UnitOfWork::new();
        uow.insert_account(account);
        let events = uow.commit(&ctx.store).await?;

        Ok(CommandOutcome::with_events(id, events))
    }
}

/// Draws random 10-digit candidates until one is unused; the budget is
/// finite so a saturated number space surfaces as an Internal error instead
/// of a hang.
async fn allocate_account_number(ctx: &AppContext) -> Result<AccountNumber, CoreError> {
    for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
        let candidate = random_account_number();

        if !ctx.store.account_number_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(CoreError::Internal(format!(
        "could not allocate a unique account number in {ACCOUNT_NUMBER_ATTEMPTS} attempts"
    )))
}

fn random_account_number() -> AccountNumber {
    let digits: u64 = rand::thread_rng().gen_range(0..10_000_000_000);

    AccountNumber::parse(format!("{digits:010}")).expect("ten digits always parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_numbers_are_ten_digits() {
        for _ in 0..100 {
            let number = random_account_number();
            assert_eq!(number.as_str().len(), 10);
        }
    }
}
