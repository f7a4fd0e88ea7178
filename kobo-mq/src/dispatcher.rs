use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use dyn_clone::DynClone;
use kobo_core::PendingEvent;
use tracing::{debug, error};

/// A same-process subscriber. Handlers must be idempotent: the relay
/// redelivers events at least once.
#[async_trait]
pub trait EventHandler: DynClone + Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &PendingEvent) -> anyhow::Result<()>;
}

dyn_clone::clone_trait_object!(EventHandler);

/// One or more subscribers failed. The command pipeline ignores this (the
/// event is already durable in the outbox); the relay uses it to count the
/// attempt.
#[derive(Debug)]
pub struct PublishError {
    pub failures: Vec<(String, String)>,
}

impl std::error::Error for PublishError {}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self
            .failures
            .iter()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");

        write!(f, "{} subscriber(s) failed: {detail}", self.failures.len())
    }
}

/// Routes one event to every subscriber registered for its type, in
/// registration order, sequentially, on the calling task.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Vec<Box<dyn EventHandler>>>,
    wildcard: Vec<Box<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<H: EventHandler + 'static>(mut self, event_name: impl Into<String>, handler: H) -> Self {
        self.handlers
            .entry(event_name.into())
            .or_default()
            .push(Box::new(handler));

        self
    }

    /// Subscribes the handler to every event type.
    pub fn on_any<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        self.wildcard.push(Box::new(handler));

        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.wildcard.is_empty()
    }

    /// Runs every matching subscriber. A failing subscriber is logged and
    /// the rest still run; the aggregated failure is returned for callers
    /// that account for delivery attempts.
    pub async fn publish(&self, event: &PendingEvent) -> Result<(), PublishError> {
        let name = event.event.name();
        let mut failures = Vec::new();

        let typed = self.handlers.get(name).map(Vec::as_slice).unwrap_or(&[]);

        for handler in typed.iter().chain(self.wildcard.iter()) {
            match handler.handle(event).await {
                Ok(()) => {
                    debug!(event = name, subscriber = handler.name(), "event handled");
                }
                Err(e) => {
                    error!(
                        event = name,
                        subscriber = handler.name(),
                        error = %e,
                        "subscriber failed"
                    );
                    failures.push((handler.name().to_owned(), e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { failures })
        }
    }
}
