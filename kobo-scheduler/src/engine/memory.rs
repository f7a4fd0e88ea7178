use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::Result;
use crate::job::{Job, JobCounts, JobQueue, JobState, RecurringJob};

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<Uuid, Job>,
    recurring: HashMap<String, RecurringJob>,
    servers: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<State>>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn runnable(job: &Job, now: DateTime<Utc>) -> bool {
    match job.state {
        JobState::Enqueued | JobState::Retrying => job.run_at <= now,
        JobState::Processing => job.invisible_until.is_some_and(|until| until < now),
        _ => false,
    }
}

#[async_trait]
impl Engine for Memory {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        self.0.write().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        self.0.write().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        Ok(self.0.write().jobs.remove(&id).is_some())
    }

    async fn job_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.0.read().jobs.get(&id).cloned())
    }

    async fn fetch_due(
        &self,
        queue: JobQueue,
        limit: u32,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>> {
        let mut state = self.0.write();

        let mut due: Vec<Uuid> = state
            .jobs
            .values()
            .filter(|job| job.queue == queue && runnable(job, now))
            .map(|job| (job.run_at, job.id))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        due.truncate(limit as usize);

        let lease_until = now + chrono::Duration::from_std(lease).unwrap_or_default();
        let mut claimed = Vec::with_capacity(due.len());

        for id in due {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.state = JobState::Processing;
                job.attempts += 1;
                job.invisible_until = Some(lease_until);
                job.updated_at = now;
                claimed.push(job.clone());
            }
        }

        Ok(claimed)
    }

    async fn upsert_recurring(&self, recurring: &RecurringJob) -> Result<()> {
        self.0
            .write()
            .recurring
            .insert(recurring.id.clone(), recurring.clone());

        Ok(())
    }

    async fn delete_recurring(&self, id: &str) -> Result<bool> {
        Ok(self.0.write().recurring.remove(id).is_some())
    }

    async fn recurring_by_id(&self, id: &str) -> Result<Option<RecurringJob>> {
        Ok(self.0.read().recurring.get(id).cloned())
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<RecurringJob>> {
        let state = self.0.read();
        let mut due: Vec<RecurringJob> = state
            .recurring
            .values()
            .filter(|r| r.next_run <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_run.cmp(&b.next_run));

        Ok(due)
    }

    async fn set_recurring_next(&self, id: &str, next_run: DateTime<Utc>) -> Result<()> {
        if let Some(recurring) = self.0.write().recurring.get_mut(id) {
            recurring.next_run = next_run;
            recurring.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let state = self.0.read();
        let mut counts = JobCounts {
            scheduled: state.recurring.len() as u64,
            ..JobCounts::default()
        };

        for job in state.jobs.values() {
            match job.state {
                JobState::Created | JobState::Enqueued => counts.enqueued += 1,
                JobState::Processing => counts.processing += 1,
                JobState::Succeeded => counts.succeeded += 1,
                JobState::Retrying => counts.retrying += 1,
                JobState::Dead => counts.failed += 1,
            }
        }

        Ok(counts)
    }

    async fn history(&self, limit: u32) -> Result<Vec<Job>> {
        let state = self.0.read();
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs.truncate(limit as usize);

        Ok(jobs)
    }

    async fn heartbeat(&self, server: &str, now: DateTime<Utc>) -> Result<()> {
        self.0.write().servers.insert(server.to_owned(), now);
        Ok(())
    }

    async fn alive_servers(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let state = self.0.read();
        let mut servers: Vec<String> = state
            .servers
            .iter()
            .filter(|(_, seen)| **seen >= since)
            .map(|(name, _)| name.clone())
            .collect();
        servers.sort();

        Ok(servers)
    }
}
