#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use kobo::command::{CreateAccount, CreateCustomer};
use kobo::context::AppContext;
use kobo::outbound::{EmailService, TextStatementRenderer};
use kobo::pipeline::Pipeline;
use kobo_core::{AccountId, AccountType, CustomerId};
use kobo_mq::Dispatcher;
use kobo_store::Store;
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// Captures outbound mail instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingEmail {
    pub statements: Arc<Mutex<Vec<(String, NaiveDate)>>>,
    pub job_alerts: Arc<Mutex<Vec<String>>>,
    pub critical_alerts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EmailService for RecordingEmail {
    async fn send_statement_notification(
        &self,
        email: &str,
        _full_name: &str,
        statement_date: NaiveDate,
        _artifact: &[u8],
    ) -> anyhow::Result<()> {
        self.statements
            .lock()
            .push((email.to_owned(), statement_date));
        Ok(())
    }

    async fn send_job_failure_alert(
        &self,
        subject: &str,
        _message: &str,
        _details: &str,
    ) -> anyhow::Result<()> {
        self.job_alerts.lock().push(subject.to_owned());
        Ok(())
    }

    async fn send_critical_alert(
        &self,
        subject: &str,
        _message: &str,
        _details: &str,
    ) -> anyhow::Result<()> {
        self.critical_alerts.lock().push(subject.to_owned());
        Ok(())
    }
}

pub fn context_with_email(email: Box<dyn EmailService>) -> AppContext {
    AppContext {
        store: Store::in_memory(),
        dispatcher: Dispatcher::new(),
        email,
        renderer: Box::new(TextStatementRenderer),
    }
}

pub fn test_context() -> AppContext {
    context_with_email(Box::new(RecordingEmail::default()))
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub async fn seed_customer(pipeline: &Pipeline, email: &str) -> CustomerId {
    pipeline
        .execute(CreateCustomer {
            first_name: "Ada".to_owned(),
            last_name: "Obi".to_owned(),
            email: email.to_owned(),
            phone: "+2348012345678".to_owned(),
            address: "12 Marina Rd, Lagos".to_owned(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            bvn: "12345678901".to_owned(),
            credit_score: 700,
        })
        .await
        .unwrap()
}

pub async fn seed_account(
    pipeline: &Pipeline,
    customer_id: CustomerId,
    account_type: AccountType,
    initial_deposit: Decimal,
) -> AccountId {
    pipeline
        .execute(CreateAccount {
            customer_id,
            account_type,
            initial_deposit,
            currency: "NGN".to_owned(),
        })
        .await
        .unwrap()
}

pub async fn account_number(ctx: &AppContext, id: AccountId) -> String {
    ctx.store
        .account_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .account_number
        .to_string()
}
