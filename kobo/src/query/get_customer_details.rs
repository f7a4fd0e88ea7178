use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kobo_core::{CoreError, CustomerId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::Query;
use crate::query::get_customers::{customer_dto, AccountSummaryDto};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GetCustomerDetails {
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetailsDto {
    pub id: CustomerId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub credit_score: i32,
    pub email_opt_in: bool,
    pub date_created: DateTime<Utc>,
    pub is_active: bool,
    pub accounts: Vec<AccountSummaryDto>,
}

#[async_trait]
impl Query for GetCustomerDetails {
    type Output = CustomerDetailsDto;

    async fn fetch(&self, ctx: &AppContext) -> Result<CustomerDetailsDto, CoreError> {
        let customer = ctx
            .store
            .customer_by_id(self.customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("customer", self.customer_id))?;
        let accounts = ctx.store.accounts_for_customer(customer.id).await?;
        let summary = customer_dto(&customer, &accounts);

        Ok(CustomerDetailsDto {
            id: customer.id,
            full_name: summary.full_name,
            email: summary.email,
            phone: summary.phone,
            address: customer.address.clone(),
            date_of_birth: customer.date_of_birth,
            credit_score: customer.credit_score,
            email_opt_in: customer.email_opt_in,
            date_created: customer.date_created,
            is_active: customer.is_active,
            accounts: summary.accounts,
        })
    }
}
