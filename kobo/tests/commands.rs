mod common;

use chrono::NaiveDate;
use common::{account_number, seed_account, seed_customer, test_context};
use kobo::command::{CreateCustomer, DepositMoney, TransferMoney, WithdrawMoney};
use kobo::pipeline::Pipeline;
use kobo::query::{GetAccountDetails, GetCustomerDetails, GetCustomers, GetTransactionHistory};
use kobo_core::{AccountType, CoreError};
use kobo_mq::{Dispatcher, OutboxRelay};
use rust_decimal_macros::dec;

fn customer_input(email: &str) -> CreateCustomer {
    CreateCustomer {
        first_name: "Ada".to_owned(),
        last_name: "Obi".to_owned(),
        email: email.to_owned(),
        phone: "+2348012345678".to_owned(),
        address: "12 Marina Rd, Lagos".to_owned(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
        bvn: "12345678901".to_owned(),
        credit_score: 700,
    }
}

#[tokio::test]
async fn happy_path_transfer_lands_in_the_outbox_and_relays() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let source = seed_account(&pipeline, customer, AccountType::Checking, dec!(1000)).await;
    let dest = seed_account(&pipeline, customer, AccountType::Checking, dec!(500)).await;

    let receipt = pipeline
        .execute(TransferMoney {
            source_account_number: account_number(&ctx, source).await,
            destination_account_number: account_number(&ctx, dest).await,
            amount: dec!(200),
            currency: "NGN".to_owned(),
            reference: "R1".to_owned(),
            description: "x".to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(receipt.reference, "R1");

    let source_account = ctx.store.account_by_id(source).await.unwrap().unwrap();
    let dest_account = ctx.store.account_by_id(dest).await.unwrap().unwrap();
    assert_eq!(source_account.balance().amount(), dec!(800));
    assert_eq!(dest_account.balance().amount(), dec!(1100));

    // exactly one MoneyTransferred row, not yet processed
    let pending = ctx.store.pending_outbox(50, 3).await.unwrap();
    let transferred: Vec<_> = pending
        .iter()
        .filter(|m| m.name == "MoneyTransferred")
        .collect();
    assert_eq!(transferred.len(), 1);
    assert!(transferred[0].processed_on.is_none());
    let row_id = transferred[0].id;

    // one relay iteration delivers it
    let relay = OutboxRelay::new(ctx.store.clone(), Dispatcher::new());
    relay.run_once().await.unwrap();

    let row = ctx.store.outbox_by_id(row_id).await.unwrap().unwrap();
    assert!(row.processed_on.is_some());
    assert_eq!(row.retry_count, 0);
}

#[tokio::test]
async fn concurrent_debits_never_both_succeed() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let account = seed_account(&pipeline, customer, AccountType::Checking, dec!(100)).await;
    let number = account_number(&ctx, account).await;

    let withdraw = |desc: &str| WithdrawMoney {
        account_number: number.clone(),
        amount: dec!(80),
        currency: "NGN".to_owned(),
        description: desc.to_owned(),
    };

    let (first, second) = tokio::join!(
        pipeline.execute(withdraw("first")),
        pipeline.execute(withdraw("second"))
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one debit may win");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.unwrap_err(),
        CoreError::Conflict | CoreError::InsufficientFunds { .. }
    ));

    let balance = ctx
        .store
        .account_by_id(account)
        .await
        .unwrap()
        .unwrap()
        .balance()
        .amount();
    assert_eq!(balance, dec!(20));
}

#[tokio::test]
async fn cross_currency_transfer_is_rejected_without_side_effects() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let source = seed_account(&pipeline, customer, AccountType::Checking, dec!(1000)).await;
    let dest = seed_account(&pipeline, customer, AccountType::Checking, dec!(500)).await;

    let err = pipeline
        .execute(TransferMoney {
            source_account_number: account_number(&ctx, source).await,
            destination_account_number: account_number(&ctx, dest).await,
            amount: dec!(100),
            currency: "USD".to_owned(),
            reference: String::new(),
            description: "x".to_owned(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));

    let pending = ctx.store.pending_outbox(50, 3).await.unwrap();
    assert!(pending.iter().all(|m| m.name != "MoneyTransferred"));

    let source_account = ctx.store.account_by_id(source).await.unwrap().unwrap();
    assert_eq!(source_account.balance().amount(), dec!(1000));
}

#[tokio::test]
async fn shortfall_surfaces_and_still_persists_the_event() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let account = seed_account(&pipeline, customer, AccountType::Checking, dec!(100)).await;

    let err = pipeline
        .execute(WithdrawMoney {
            account_number: account_number(&ctx, account).await,
            amount: dec!(100.01),
            currency: "NGN".to_owned(),
            description: "too much".to_owned(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { .. }));

    // the rejection reached the outbox even though the command failed
    let pending = ctx.store.pending_outbox(50, 3).await.unwrap();
    assert!(pending.iter().any(|m| m.name == "InsufficientFunds"));

    // and the balance never moved
    let balance = ctx
        .store
        .account_by_id(account)
        .await
        .unwrap()
        .unwrap()
        .balance()
        .amount();
    assert_eq!(balance, dec!(100));
}

#[tokio::test]
async fn duplicate_email_is_a_validation_failure_case_insensitively() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    pipeline
        .execute(customer_input("Ada.Obi@Example.com"))
        .await
        .unwrap();

    let err = pipeline
        .execute(customer_input("ada.obi@example.com"))
        .await
        .unwrap_err();

    match err {
        CoreError::Validation(violations) => {
            assert!(violations.iter().any(|v| v.contains("already registered")));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn validation_lists_every_violation_at_once() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let err = pipeline
        .execute(CreateCustomer {
            first_name: String::new(),
            last_name: "Obi".to_owned(),
            email: "not-an-email".to_owned(),
            phone: "+2348012345678".to_owned(),
            address: String::new(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            bvn: "123".to_owned(),
            credit_score: 700,
        })
        .await
        .unwrap_err();

    match err {
        CoreError::Validation(violations) => {
            assert!(violations.iter().any(|v| v.contains("first name")));
            assert!(violations.iter().any(|v| v.contains("email")));
            assert!(violations.iter().any(|v| v.contains("BVN")));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn underage_customers_are_rejected() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let mut input = customer_input("kid@example.com");
    input.date_of_birth = chrono::Utc::now().date_naive() - chrono::Duration::days(17 * 365);

    let err = pipeline.execute(input).await.unwrap_err();

    match err {
        CoreError::Validation(violations) => {
            assert!(violations.iter().any(|v| v.contains("18")));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn account_details_include_the_owner_name() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let account = seed_account(&pipeline, customer, AccountType::Savings, dec!(250)).await;
    let number = account_number(&ctx, account).await;

    let details = pipeline
        .query(GetAccountDetails {
            account_number: number.clone(),
        })
        .await
        .unwrap();

    assert_eq!(details.account_number, number);
    assert_eq!(details.account_type, AccountType::Savings);
    assert_eq!(details.balance, dec!(250));
    assert_eq!(details.currency, "NGN");
    assert_eq!(details.owner_name, "Ada Obi");
    assert!(details.is_active);

    let missing = pipeline
        .query(GetAccountDetails {
            account_number: "0000000000".to_owned(),
        })
        .await
        .unwrap_err();
    assert!(matches!(missing, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn transaction_history_is_ordered_and_bounded() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    let account = seed_account(&pipeline, customer, AccountType::Checking, dec!(1000)).await;
    let number = account_number(&ctx, account).await;

    for (amount, desc) in [(dec!(10), "a"), (dec!(20), "b")] {
        pipeline
            .execute(DepositMoney {
                account_number: number.clone(),
                amount,
                currency: "NGN".to_owned(),
                description: desc.to_owned(),
            })
            .await
            .unwrap();
    }

    let start = common::at(2000, 1, 1);
    let end = chrono::Utc::now() + chrono::Duration::days(1);
    let history = pipeline
        .query(GetTransactionHistory {
            account_id: account,
            start,
            end,
        })
        .await
        .unwrap();

    // opening deposit plus the two above, oldest first
    assert_eq!(history.len(), 3);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let err = pipeline
        .query(GetTransactionHistory {
            account_id: account,
            start: end,
            end: start,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn customer_queries_include_account_summaries() {
    let ctx = test_context();
    let pipeline = Pipeline::new(ctx.clone());

    let customer = seed_customer(&pipeline, "ada@example.com").await;
    seed_account(&pipeline, customer, AccountType::Checking, dec!(100)).await;
    seed_account(&pipeline, customer, AccountType::Savings, dec!(900)).await;

    let customers = pipeline.query(GetCustomers {}).await.unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].accounts.len(), 2);

    let details = pipeline
        .query(GetCustomerDetails {
            customer_id: customer,
        })
        .await
        .unwrap();
    assert_eq!(details.full_name, "Ada Obi");
    assert_eq!(details.accounts.len(), 2);
    assert!(details.email_opt_in);
}
