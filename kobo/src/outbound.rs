use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dyn_clone::DynClone;
use kobo_core::{Account, Transaction};
use serde_json::Value;
use tracing::{debug, info};

/// Outbound mail transport. Asynchronous; failures are logged by callers
/// and never retried by the core.
#[async_trait]
pub trait EmailService: DynClone + Send + Sync {
    async fn send_statement_notification(
        &self,
        email: &str,
        full_name: &str,
        statement_date: NaiveDate,
        artifact: &[u8],
    ) -> anyhow::Result<()>;

    async fn send_job_failure_alert(
        &self,
        subject: &str,
        message: &str,
        details: &str,
    ) -> anyhow::Result<()>;

    async fn send_critical_alert(
        &self,
        subject: &str,
        message: &str,
        details: &str,
    ) -> anyhow::Result<()>;
}

dyn_clone::clone_trait_object!(EmailService);

#[async_trait]
pub trait StatementRenderer: DynClone + Send + Sync {
    async fn render_account_statement(
        &self,
        account: &Account,
        transactions: &[Transaction],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<u8>>;
}

dyn_clone::clone_trait_object!(StatementRenderer);

/// Reserved for a future relay revision that forwards events to an external
/// broker instead of the in-process subscriber set.
#[async_trait]
pub trait EventSink: DynClone + Send + Sync {
    async fn publish(
        &self,
        event_type: &str,
        payload: &Value,
        occurred_on: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

dyn_clone::clone_trait_object!(EventSink);

/// Stand-in transport that only writes to the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailService;

#[async_trait]
impl EmailService for LoggingEmailService {
    async fn send_statement_notification(
        &self,
        email: &str,
        full_name: &str,
        statement_date: NaiveDate,
        artifact: &[u8],
    ) -> anyhow::Result<()> {
        info!(
            email,
            full_name,
            %statement_date,
            bytes = artifact.len(),
            "statement notification"
        );
        Ok(())
    }

    async fn send_job_failure_alert(
        &self,
        subject: &str,
        message: &str,
        details: &str,
    ) -> anyhow::Result<()> {
        info!(subject, message, details, "job failure alert");
        Ok(())
    }

    async fn send_critical_alert(
        &self,
        subject: &str,
        message: &str,
        details: &str,
    ) -> anyhow::Result<()> {
        info!(subject, message, details, "critical alert");
        Ok(())
    }
}

/// Plain-text statement artifact; PDF rendering stays behind this seam.
#[derive(Debug, Clone, Default)]
pub struct TextStatementRenderer;

#[async_trait]
impl StatementRenderer for TextStatementRenderer {
    async fn render_account_statement(
        &self,
        account: &Account,
        transactions: &[Transaction],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut lines = vec![
            format!("Account statement for {}", account.account_number),
            format!(
                "Period {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            format!("Closing balance: {}", account.balance()),
            String::new(),
        ];

        for tx in transactions {
            lines.push(format!(
                "{}  {:<14} {:>16}  {}  {}",
                tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                tx.tx_type.to_string(),
                tx.amount.to_string(),
                tx.reference,
                tx.description
            ));
        }

        lines.push(String::new());
        lines.push(format!("{} transaction(s)", transactions.len()));

        Ok(lines.join("\n").into_bytes())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn publish(
        &self,
        event_type: &str,
        payload: &Value,
        occurred_on: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        debug!(event_type, %occurred_on, %payload, "event sink publish");
        Ok(())
    }
}
