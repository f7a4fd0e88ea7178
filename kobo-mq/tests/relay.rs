use std::sync::Arc;

use async_trait::async_trait;
use kobo_core::{AccountNumber, DomainEvent, InsufficientFunds, Money, PendingEvent};
use kobo_mq::{Dispatcher, EventHandler, OutboxRelay, RelayConfig};
use kobo_store::{OutboxMessage, Store};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Probe {
    delivered: Arc<Mutex<Vec<String>>>,
    failures_left: Arc<Mutex<u32>>,
}

#[async_trait]
impl EventHandler for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn handle(&self, event: &PendingEvent) -> anyhow::Result<()> {
        let mut failures = self.failures_left.lock();

        if *failures > 0 {
            *failures -= 1;
            anyhow::bail!("probe rejecting on purpose");
        }

        self.delivered.lock().push(event.event.name().to_owned());
        Ok(())
    }
}

fn insufficient_funds_event() -> PendingEvent {
    PendingEvent::new(DomainEvent::InsufficientFunds(InsufficientFunds {
        account_number: AccountNumber::parse("0123456789").unwrap(),
        requested_amount: Money::new(dec!(80), "NGN").unwrap(),
        current_balance: Money::new(dec!(20), "NGN").unwrap(),
        operation: "Withdrawal".to_owned(),
    }))
}

async fn seed_outbox(store: &Store, events: &[PendingEvent]) {
    let rows: Vec<OutboxMessage> = events
        .iter()
        .map(|e| OutboxMessage::from_pending(e).unwrap())
        .collect();
    store.save_outbox(&rows).await.unwrap();
}

#[tokio::test]
async fn delivers_and_marks_processed_in_one_pass() {
    let store = Store::in_memory();
    let probe = Probe::default();
    let relay = OutboxRelay::new(
        store.clone(),
        Dispatcher::new().on("InsufficientFunds", probe.clone()),
    );

    let event = insufficient_funds_event();
    seed_outbox(&store, std::slice::from_ref(&event)).await;

    let outcome = relay.run_once().await.unwrap();
    assert_eq!(outcome.delivered, 1);

    let row = store.outbox_by_id(event.id).await.unwrap().unwrap();
    assert!(row.processed_on.is_some());
    assert_eq!(row.retry_count, 0);
    assert!(row.error.is_none());
    assert_eq!(*probe.delivered.lock(), vec!["InsufficientFunds"]);
}

#[tokio::test]
async fn retry_count_progresses_until_third_attempt_succeeds() {
    let store = Store::in_memory();
    let probe = Probe {
        failures_left: Arc::new(Mutex::new(2)),
        ..Probe::default()
    };
    let relay = OutboxRelay::new(
        store.clone(),
        Dispatcher::new().on("InsufficientFunds", probe.clone()),
    );

    let event = insufficient_funds_event();
    seed_outbox(&store, std::slice::from_ref(&event)).await;

    // first two polls fail, bumping the retry count
    for expected in [1, 2] {
        relay.run_once().await.unwrap();
        let row = store.outbox_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(row.retry_count, expected);
        assert!(row.processed_on.is_none());
        assert!(row.error.is_some());
    }

    // third poll delivers; the error clears, the failed attempts remain
    // on record
    relay.run_once().await.unwrap();
    let row = store.outbox_by_id(event.id).await.unwrap().unwrap();
    assert!(row.processed_on.is_some());
    assert_eq!(row.retry_count, 2);
    assert!(row.error.is_none());
}

#[tokio::test]
async fn exhausted_rows_are_quarantined_until_requeued() {
    let store = Store::in_memory();
    let probe = Probe {
        failures_left: Arc::new(Mutex::new(u32::MAX)),
        ..Probe::default()
    };
    let relay = OutboxRelay::new(
        store.clone(),
        Dispatcher::new().on("InsufficientFunds", probe.clone()),
    );

    let event = insufficient_funds_event();
    seed_outbox(&store, std::slice::from_ref(&event)).await;

    for _ in 0..3 {
        let outcome = relay.run_once().await.unwrap();
        assert_eq!(outcome.failed, 1);
    }

    // retry_count reached the bound: the poller ignores the row now
    let outcome = relay.run_once().await.unwrap();
    assert_eq!(outcome, kobo_mq::RelayOutcome::default());

    let dead = store.dead_outbox(3).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].retry_count, 3);

    // the operator reset puts it back on the queue
    *probe.failures_left.lock() = 0;
    assert!(store.requeue_outbox(event.id).await.unwrap());
    let outcome = relay.run_once().await.unwrap();
    assert_eq!(outcome.delivered, 1);
}

#[tokio::test]
async fn unknown_event_types_are_retired_with_a_warning() {
    let store = Store::in_memory();
    let relay = OutboxRelay::new(store.clone(), Dispatcher::new());

    let event = insufficient_funds_event();
    let mut row = OutboxMessage::from_pending(&event).unwrap();
    row.name = "AccountMerged".to_owned();
    store.save_outbox(std::slice::from_ref(&row)).await.unwrap();

    let outcome = relay.run_once().await.unwrap();
    assert_eq!(outcome.skipped, 1);

    let row = store.outbox_by_id(row.id).await.unwrap().unwrap();
    assert!(row.processed_on.is_some());
    assert_eq!(row.retry_count, 0);
}

#[tokio::test]
async fn batch_is_processed_in_occurred_on_order() {
    let store = Store::in_memory();
    let probe = Probe::default();
    let relay = OutboxRelay::new(
        store.clone(),
        Dispatcher::new().on_any(probe.clone()),
    );

    let mut first = insufficient_funds_event();
    let mut second = insufficient_funds_event();
    first.occurred_on = chrono::Utc::now() - chrono::Duration::seconds(10);
    second.occurred_on = chrono::Utc::now();

    // seed newest first; the relay must still deliver oldest first
    seed_outbox(&store, &[second.clone(), first.clone()]).await;

    relay.run_once().await.unwrap();

    let delivered = probe.delivered.lock();
    assert_eq!(delivered.len(), 2);

    let first_row = store.outbox_by_id(first.id).await.unwrap().unwrap();
    let second_row = store.outbox_by_id(second.id).await.unwrap().unwrap();
    assert!(first_row.processed_on.unwrap() <= second_row.processed_on.unwrap());
}

#[tokio::test]
async fn batch_size_bounds_one_iteration() {
    let store = Store::in_memory();
    let probe = Probe::default();
    let relay = OutboxRelay::new(store.clone(), Dispatcher::new().on_any(probe.clone()))
        .with_config(RelayConfig {
            batch_size: 2,
            ..RelayConfig::default()
        });

    let events: Vec<PendingEvent> = (0..5).map(|_| insufficient_funds_event()).collect();
    seed_outbox(&store, &events).await;

    assert_eq!(relay.run_once().await.unwrap().delivered, 2);
    assert_eq!(relay.run_once().await.unwrap().delivered, 2);
    assert_eq!(relay.run_once().await.unwrap().delivered, 1);
}

#[tokio::test]
async fn cancellation_stops_the_loop() {
    let store = Store::in_memory();
    let relay = OutboxRelay::new(store, Dispatcher::new()).with_config(RelayConfig {
        poll_interval: std::time::Duration::from_millis(10),
        ..RelayConfig::default()
    });

    let token = CancellationToken::new();
    let handle = relay.start(token.clone());

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    token.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("relay task should stop after cancellation")
        .unwrap();
}
