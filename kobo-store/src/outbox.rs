use chrono::{DateTime, Utc};
use kobo_core::{DomainEvent, PendingEvent};
use serde_json::Value;
use uuid::Uuid;

/// A pending event persisted in the same transaction as the state change
/// that produced it. `retry_count` counts failed delivery attempts; rows at
/// the retry bound form the dead-letter set.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub name: String,
    pub content: Value,
    pub occurred_on: DateTime<Utc>,
    pub processed_on: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub error: Option<String>,
}

impl OutboxMessage {
    pub fn from_pending(event: &PendingEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: event.id,
            name: event.event.name().to_owned(),
            content: event.event.to_payload()?,
            occurred_on: event.occurred_on,
            processed_on: None,
            retry_count: 0,
            error: None,
        })
    }

    /// Resolves the persisted payload back into its event. `Ok(None)` means
    /// the type tag is unknown to this build.
    pub fn to_pending(&self) -> serde_json::Result<Option<PendingEvent>> {
        let Some(event) = DomainEvent::from_payload(&self.name, &self.content)? else {
            return Ok(None);
        };

        Ok(Some(PendingEvent {
            id: self.id,
            occurred_on: self.occurred_on,
            event,
        }))
    }

    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed_on = Some(now);
        self.error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use kobo_core::{AccountNumber, InsufficientFunds, Money};
    use rust_decimal_macros::dec;

    use super::*;

    fn pending() -> PendingEvent {
        PendingEvent::new(DomainEvent::InsufficientFunds(InsufficientFunds {
            account_number: AccountNumber::parse("0123456789").unwrap(),
            requested_amount: Money::new(dec!(80), "NGN").unwrap(),
            current_balance: Money::new(dec!(20), "NGN").unwrap(),
            operation: "Withdrawal".to_owned(),
        }))
    }

    #[test]
    fn round_trips_through_the_row_shape() {
        let event = pending();
        let row = OutboxMessage::from_pending(&event).unwrap();

        assert_eq!(row.id, event.id);
        assert_eq!(row.name, "InsufficientFunds");
        assert_eq!(row.retry_count, 0);
        assert!(row.processed_on.is_none());

        let restored = row.to_pending().unwrap().unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn unknown_tag_yields_none() {
        let mut row = OutboxMessage::from_pending(&pending()).unwrap();
        row.name = "SomethingElse".to_owned();
        assert!(row.to_pending().unwrap().is_none());
    }

    #[test]
    fn failure_bookkeeping() {
        let mut row = OutboxMessage::from_pending(&pending()).unwrap();

        row.record_failure("smtp timeout");
        row.record_failure("smtp timeout");
        assert_eq!(row.retry_count, 2);
        assert_eq!(row.error.as_deref(), Some("smtp timeout"));

        row.mark_processed(Utc::now());
        assert!(row.processed_on.is_some());
        assert!(row.error.is_none());
        // retry_count keeps recording the failed prior attempts
        assert_eq!(row.retry_count, 2);
    }
}
