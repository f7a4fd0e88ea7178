use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::job::{Job, JobCounts, JobQueue, RecurringJob};

mod memory;
pub use memory::Memory;

#[cfg(feature = "pg")]
mod pg;
#[cfg(feature = "pg")]
pub use pg::Pg;

/// Durable queue backend shared by every scheduler worker in a deployment.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn insert_job(&self, job: &Job) -> Result<()>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    async fn delete_job(&self, id: Uuid) -> Result<bool>;
    async fn job_by_id(&self, id: Uuid) -> Result<Option<Job>>;

    /// Claims up to `limit` runnable jobs on one queue: due Enqueued and
    /// Retrying rows plus Processing rows whose invisibility lease lapsed.
    /// Claimed rows come back Processing with `attempts` bumped and a fresh
    /// lease, so a crashing worker cannot hold a job forever.
    async fn fetch_due(
        &self,
        queue: JobQueue,
        limit: u32,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>>;

    /// Idempotent by `recurring.id`: an existing row is overwritten.
    async fn upsert_recurring(&self, recurring: &RecurringJob) -> Result<()>;
    async fn delete_recurring(&self, id: &str) -> Result<bool>;
    async fn recurring_by_id(&self, id: &str) -> Result<Option<RecurringJob>>;
    async fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<RecurringJob>>;
    async fn set_recurring_next(&self, id: &str, next_run: DateTime<Utc>) -> Result<()>;

    // dashboard reads
    async fn counts(&self) -> Result<JobCounts>;
    async fn history(&self, limit: u32) -> Result<Vec<Job>>;
    async fn heartbeat(&self, server: &str, now: DateTime<Utc>) -> Result<()>;
    async fn alive_servers(&self, since: DateTime<Utc>) -> Result<Vec<String>>;
}
