use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use kobo_core::{Account, AccountNumber, AccountType, Customer, Money};
use kobo_store::{Store, UnitOfWork};
use rust_decimal::Decimal;

pub fn ngn(amount: Decimal) -> Money {
    Money::new(amount, "NGN").unwrap()
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn customer(email: &str) -> Customer {
    Customer::new(
        "Ada",
        "Obi",
        email,
        "+2348012345678",
        "12 Marina Rd, Lagos",
        NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
        "12345678901",
        700,
        Utc::now(),
    )
}

/// Commits a customer plus one account opened with `initial` and returns the
/// persisted account.
pub async fn seed_account(
    store: &Store,
    number: &str,
    account_type: AccountType,
    initial: Decimal,
    opened: DateTime<Utc>,
) -> Account {
    let customer = customer(&format!("{number}@example.com"));
    let account = Account::open(
        customer.id,
        AccountNumber::parse(number).unwrap(),
        account_type,
        ngn(initial),
        opened,
    )
    .unwrap();
    let id = account.id;

    let mut uow = UnitOfWork::new();
    uow.insert_customer(customer);
    uow.insert_account(account);
    uow.commit(store).await.unwrap();

    store.account_by_id(id).await.unwrap().unwrap()
}
