use async_trait::async_trait;
use kobo_core::{Account, AccountStatus, AccountType, CoreError, Customer, CustomerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::Query;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GetCustomers {}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummaryDto {
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub currency: String,
    pub status: AccountStatus,
}

impl From<&Account> for AccountSummaryDto {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.account_number.to_string(),
            account_type: account.account_type,
            balance: account.balance().amount(),
            currency: account.balance().currency().to_owned(),
            status: account.status(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDto {
    pub id: CustomerId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub is_active: bool,
    pub accounts: Vec<AccountSummaryDto>,
}

pub(crate) fn customer_dto(customer: &Customer, accounts: &[Account]) -> CustomerDto {
    CustomerDto {
        id: customer.id,
        full_name: customer.full_name(),
        email: customer.email().to_owned(),
        phone: customer.phone.clone(),
        is_active: customer.is_active,
        accounts: accounts.iter().map(AccountSummaryDto::from).collect(),
    }
}

#[async_trait]
impl Query for GetCustomers {
    type Output = Vec<CustomerDto>;

    async fn fetch(&self, ctx: &AppContext) -> Result<Vec<CustomerDto>, CoreError> {
        let customers = ctx.store.customers().await?;
        let mut dtos = Vec::with_capacity(customers.len());

        for customer in &customers {
            let accounts = ctx.store.accounts_for_customer(customer.id).await?;
            dtos.push(customer_dto(customer, &accounts));
        }

        Ok(dtos)
    }
}
