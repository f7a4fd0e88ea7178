use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kobo_core::{AccountNumber, AccountType, CoreError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::Query;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GetAccountDetails {
    #[validate(length(equal = 10, message = "account number must be 10 digits"))]
    pub account_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDetailsDto {
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub currency: String,
    pub date_opened: DateTime<Utc>,
    pub is_active: bool,
    pub owner_name: String,
}

#[async_trait]
impl Query for GetAccountDetails {
    type Output = AccountDetailsDto;

    async fn fetch(&self, ctx: &AppContext) -> Result<AccountDetailsDto, CoreError> {
        let number = AccountNumber::parse(&self.account_number)?;
        let account = ctx
            .store
            .account_by_number(&number)
            .await?
            .ok_or_else(|| CoreError::not_found("account", &number))?;
        let owner = ctx
            .store
            .customer_by_id(account.customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("customer", account.customer_id))?;

        Ok(AccountDetailsDto {
            account_number: account.account_number.to_string(),
            account_type: account.account_type,
            balance: account.balance().amount(),
            currency: account.balance().currency().to_owned(),
            date_opened: account.date_opened,
            is_active: account.is_active,
            owner_name: owner.full_name(),
        })
    }
}
