use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use kobo_core::{CoreError, Customer, CustomerId};
use kobo_store::UnitOfWork;
use serde::Deserialize;
use validator::Validate;

use crate::context::AppContext;
use crate::pipeline::{Command, CommandOutcome};

pub const MINIMUM_AGE_YEARS: i32 = 18;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,

    #[validate(email(message = "email is malformed"))]
    pub email: String,

    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,

    #[validate(length(equal = 11, message = "BVN must be 11 digits"))]
    pub bvn: String,

    #[validate(range(min = 0, max = 1000, message = "credit score must be 0-1000"))]
    pub credit_score: i32,
}

#[async_trait]
impl Command for CreateCustomer {
    type Output = CustomerId;

    async fn handle(&self, ctx: &AppContext) -> Result<CommandOutcome<CustomerId>, CoreError> {
        let now = Utc::now();
        let mut violations = Vec::new();

        if age_on(self.date_of_birth, now.date_naive()) < MINIMUM_AGE_YEARS {
            violations.push(format!(
                "customer must be at least {MINIMUM_AGE_YEARS} years old"
            ));
        }

        if !valid_phone(&self.phone) {
            violations.push("phone is malformed".to_owned());
        }

        if ctx.store.customer_by_email(&self.email).await?.is_some() {
            violations.push(format!("email `{}` is already registered", self.email));
        }

        if !violations.is_empty() {
            return Err(CoreError::Validation(violations));
        }

        let customer = Customer::new(
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.phone,
            &self.address,
            self.date_of_birth,
            &self.bvn,
            self.credit_score,
            now,
        );
        let id = customer.id;

        let mut uow = UnitOfWork::new();
        uow.insert_customer(customer);
        let events = uow.commit(&ctx.store).await?;

        Ok(CommandOutcome::with_events(id, events))
    }
}

fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();

    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }

    age
}

/// Optional leading `+`, then 7 to 15 digits.
fn valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_respects_the_birthday_within_the_year() {
        let dob = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();

        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2018, 6, 14).unwrap()), 17);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2018, 6, 15).unwrap()), 18);
    }

    #[test]
    fn phone_shapes() {
        assert!(valid_phone("+2348012345678"));
        assert!(valid_phone("08012345678"));
        assert!(!valid_phone("12345"));
        assert!(!valid_phone("+234-801-234"));
        assert!(!valid_phone("not a phone"));
    }
}
