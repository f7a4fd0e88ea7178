use std::time::Duration;

use chrono::Utc;
use kobo_store::Store;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Sleep between polling iterations.
    pub poll_interval: Duration,

    /// Rows read per iteration.
    pub batch_size: u32,

    /// Delivery attempts before a row is quarantined.
    pub max_retries: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 20,
            max_retries: 3,
        }
    }
}

/// What one polling iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Drains the outbox to the subscriber set with at-least-once delivery.
///
/// Must run as a single logical worker per deployment: the polling query is
/// not a lease, so parallel relays would double-deliver aggressively.
#[derive(Clone)]
pub struct OutboxRelay {
    store: Store,
    dispatcher: Dispatcher,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(store: Store, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            config: RelayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawns the relay loop. Cancellation stops the loop before the next
    /// iteration; an in-flight batch is allowed to complete.
    pub fn start(&self, token: CancellationToken) -> JoinHandle<()> {
        let relay = self.clone();

        tokio::spawn(async move {
            let period = relay.config.poll_interval;
            let mut interval = interval_at(Instant::now() + period, period);

            info!(
                poll_interval = ?period,
                batch_size = relay.config.batch_size,
                "outbox relay started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("outbox relay stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match relay.run_once().await {
                            Ok(outcome) if outcome != RelayOutcome::default() => {
                                info!(
                                    delivered = outcome.delivered,
                                    failed = outcome.failed,
                                    skipped = outcome.skipped,
                                    "outbox batch processed"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => error!("outbox iteration failed: {e}"),
                        }
                    }
                }
            }
        })
    }

    /// One polling iteration: read the oldest pending rows, publish each in
    /// occurred-on order and persist the whole batch of row updates in one
    /// transaction.
    pub async fn run_once(&self) -> Result<RelayOutcome> {
        let mut batch = self
            .store
            .pending_outbox(self.config.batch_size, self.config.max_retries)
            .await?;

        if batch.is_empty() {
            return Ok(RelayOutcome::default());
        }

        let mut outcome = RelayOutcome::default();

        for row in batch.iter_mut() {
            match row.to_pending() {
                Ok(Some(event)) => match self.dispatcher.publish(&event).await {
                    Ok(()) => {
                        row.mark_processed(Utc::now());
                        outcome.delivered += 1;
                    }
                    Err(e) => {
                        row.record_failure(e.to_string());
                        outcome.failed += 1;
                    }
                },
                // unknown type tag: retire the row instead of blocking the
                // queue forever
                Ok(None) => {
                    warn!(id = %row.id, name = %row.name, "unknown event type, marking processed");
                    row.mark_processed(Utc::now());
                    outcome.skipped += 1;
                }
                Err(e) => {
                    debug!(id = %row.id, "undeserializable payload: {e}");
                    row.record_failure(e.to_string());
                    outcome.failed += 1;
                }
            }
        }

        self.store.save_outbox(&batch).await?;

        Ok(outcome)
    }
}
