use async_trait::async_trait;
use kobo_core::{DomainEvent, PendingEvent};
use kobo_mq::EventHandler;
use tracing::{debug, info};

use crate::outbound::EmailService;

/// Logs successful transfers for the operations feed. Idempotent: a
/// redelivered event just logs again.
#[derive(Debug, Clone, Default)]
pub struct TransferLogSubscriber;

#[async_trait]
impl EventHandler for TransferLogSubscriber {
    fn name(&self) -> &str {
        "transfer-log"
    }

    async fn handle(&self, event: &PendingEvent) -> anyhow::Result<()> {
        if let DomainEvent::MoneyTransferred(transfer) = &event.event {
            info!(
                source = %transfer.source_account_number,
                destination = %transfer.destination_account_number,
                amount = %transfer.amount,
                reference = %transfer.reference,
                "money transferred"
            );
        }

        Ok(())
    }
}

/// Raises a critical alert whenever an operation bounced for lack of funds.
#[derive(Clone)]
pub struct InsufficientFundsAlert {
    email: Box<dyn EmailService>,
}

impl InsufficientFundsAlert {
    pub fn new(email: Box<dyn EmailService>) -> Self {
        Self { email }
    }
}

#[async_trait]
impl EventHandler for InsufficientFundsAlert {
    fn name(&self) -> &str {
        "insufficient-funds-alert"
    }

    async fn handle(&self, event: &PendingEvent) -> anyhow::Result<()> {
        if let DomainEvent::InsufficientFunds(rejected) = &event.event {
            self.email
                .send_critical_alert(
                    "Insufficient funds",
                    &format!(
                        "{} rejected on account {}",
                        rejected.operation, rejected.account_number
                    ),
                    &format!(
                        "requested {}, balance {}",
                        rejected.requested_amount, rejected.current_balance
                    ),
                )
                .await?;
        }

        Ok(())
    }
}

/// Wildcard audit trail; sees every event once per delivery channel.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail;

#[async_trait]
impl EventHandler for AuditTrail {
    fn name(&self) -> &str {
        "audit-trail"
    }

    async fn handle(&self, event: &PendingEvent) -> anyhow::Result<()> {
        debug!(
            id = %event.id,
            name = event.event.name(),
            occurred_on = %event.occurred_on,
            "domain event"
        );

        Ok(())
    }
}
