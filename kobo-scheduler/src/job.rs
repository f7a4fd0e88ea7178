use chrono::{DateTime, Utc};
use parse_display::{Display, FromStr};
use serde_json::Value;
use uuid::Uuid;

/// Created → Enqueued → Processing → {Succeeded | Retrying | Dead}.
/// Retrying re-enters the queue at its backoff deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromStr)]
pub enum JobState {
    Created,
    Enqueued,
    Processing,
    Succeeded,
    Retrying,
    Dead,
}

/// Named worker lanes, polled in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, FromStr)]
pub enum JobQueue {
    Critical,
    #[default]
    Default,
    Low,
}

impl JobQueue {
    pub const ALL: [JobQueue; 3] = [JobQueue::Critical, JobQueue::Default, JobQueue::Low];
}

/// What happens to a job whose attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, FromStr)]
pub enum DeadAction {
    #[default]
    Keep,
    Delete,
}

/// A durable queue entry. `attempts` counts started executions, including
/// the first; `invisible_until` is the lease that keeps a crashed worker's
/// job from running twice concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub queue: JobQueue,
    pub target: String,
    pub args: Value,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    pub invisible_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub on_dead: DeadAction,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        target: impl Into<String>,
        args: Value,
        queue: JobQueue,
        run_at: DateTime<Utc>,
        max_attempts: i32,
        on_dead: DeadAction,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue,
            target: target.into(),
            args,
            state: JobState::Enqueued,
            attempts: 0,
            max_attempts,
            run_at,
            invisible_until: None,
            last_error: None,
            on_dead,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One registered recurring schedule; upserts by id keep registration
/// idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringJob {
    pub id: String,
    pub cron: String,
    pub target: String,
    pub args: Value,
    pub next_run: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dashboard counters; `scheduled` counts recurring definitions, `failed`
/// counts dead jobs awaiting operator action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub scheduled: u64,
    pub enqueued: u64,
    pub processing: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retrying: u64,
}

/// Read surface backing the dashboard UI.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub counts: JobCounts,
    pub history: Vec<Job>,
    pub servers: Vec<String>,
}
