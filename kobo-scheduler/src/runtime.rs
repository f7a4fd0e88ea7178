use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dyn_clone::DynClone;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cron::CronExpr;
use crate::engine::Engine;
use crate::error::{Result, SchedulerError};
use crate::job::{Dashboard, DeadAction, Job, JobQueue, JobState, RecurringJob};

/// A unit of background work, registered under a target name and invoked
/// with the job's persisted arguments.
#[async_trait]
pub trait JobHandler: DynClone + Send + Sync {
    async fn run(&self, args: &Value) -> anyhow::Result<Value>;
}

dyn_clone::clone_trait_object!(JobHandler);

/// Notified when a job exhausts its attempts.
#[async_trait]
pub trait AlertSink: DynClone + Send + Sync {
    async fn job_dead(&self, job: &Job);
}

dyn_clone::clone_trait_object!(AlertSink);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrent workers pulling from the queues.
    pub worker_count: usize,

    /// Retries after the first failed attempt.
    pub retry_attempts: u32,

    /// Sleep between queue polls on an idle worker.
    pub poll_interval: Duration,

    /// How long a claimed job stays invisible before a crashed worker's
    /// claim lapses.
    pub invisibility_timeout: Duration,

    /// Delay before a failed attempt re-enters the queue.
    pub retry_backoff: Duration,

    pub heartbeat_interval: Duration,

    /// Name reported on the dashboard's liveness surface.
    pub server_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            retry_attempts: 3,
            poll_interval: Duration::from_secs(1),
            invisibility_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            server_name: "kobo-scheduler".to_owned(),
        }
    }
}

/// Per-target execution options applied when a job is enqueued.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub queue: JobQueue,
    pub on_dead: DeadAction,
}

#[derive(Clone)]
struct Registered {
    handler: Box<dyn JobHandler>,
    options: JobOptions,
}

/// The persistent job manager: a durable queue plus cron-planned recurring
/// work, drained by a small worker pool.
#[derive(Clone)]
pub struct Scheduler {
    engine: Arc<dyn Engine>,
    registry: HashMap<String, Registered>,
    alert: Option<Box<dyn AlertSink>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            registry: HashMap::new(),
            alert: None,
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register<H: JobHandler + 'static>(self, target: impl Into<String>, handler: H) -> Self {
        self.register_with(target, handler, JobOptions::default())
    }

    pub fn register_with<H: JobHandler + 'static>(
        mut self,
        target: impl Into<String>,
        handler: H,
        options: JobOptions,
    ) -> Self {
        self.registry.insert(
            target.into(),
            Registered {
                handler: Box::new(handler),
                options,
            },
        );

        self
    }

    pub fn alert_sink<A: AlertSink + 'static>(mut self, sink: A) -> Self {
        self.alert = Some(Box::new(sink));
        self
    }

    fn max_attempts(&self) -> i32 {
        1 + self.config.retry_attempts as i32
    }

    fn options_for(&self, target: &str) -> JobOptions {
        self.registry
            .get(target)
            .map(|r| r.options)
            .unwrap_or_default()
    }

    /// Enqueues one execution of `target` after `delay`.
    pub async fn enqueue_in(&self, target: &str, args: Value, delay: Duration) -> Result<Uuid> {
        if !self.registry.contains_key(target) {
            return Err(SchedulerError::UnknownTarget(target.to_owned()));
        }

        let now = Utc::now();
        let run_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
        let options = self.options_for(target);
        let job = Job::new(
            target,
            args,
            options.queue,
            run_at,
            self.max_attempts(),
            options.on_dead,
            now,
        );
        let id = job.id;

        self.engine.insert_job(&job).await?;
        debug!(target, job = %id, "job enqueued");

        Ok(id)
    }

    /// Registers (or overwrites) a recurring schedule. Idempotent by
    /// `recurring_id`; the same arguments twice leave exactly one row.
    pub async fn schedule(
        &self,
        recurring_id: &str,
        target: &str,
        args: Value,
        cron: &str,
    ) -> Result<()> {
        if !self.registry.contains_key(target) {
            return Err(SchedulerError::UnknownTarget(target.to_owned()));
        }

        let expr = CronExpr::parse(cron)?;
        let now = Utc::now();
        let next_run = expr
            .next_after(now)
            .ok_or_else(|| SchedulerError::InvalidCron {
                expr: cron.to_owned(),
                reason: "expression never fires".to_owned(),
            })?;

        self.engine
            .upsert_recurring(&RecurringJob {
                id: recurring_id.to_owned(),
                cron: cron.to_owned(),
                target: target.to_owned(),
                args,
                next_run,
                updated_at: now,
            })
            .await?;

        info!(recurring_id, target, cron, %next_run, "recurring job scheduled");

        Ok(())
    }

    /// Deletes a recurring schedule by id, or a queued job by its uuid.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if self.engine.delete_recurring(id).await? {
            return Ok(true);
        }

        match id.parse::<Uuid>() {
            Ok(job_id) => self.engine.delete_job(job_id).await,
            Err(_) => Ok(false),
        }
    }

    /// Fires one execution of a recurring job now, without touching its
    /// schedule.
    pub async fn trigger(&self, recurring_id: &str) -> Result<Uuid> {
        let recurring = self
            .engine
            .recurring_by_id(recurring_id)
            .await?
            .ok_or_else(|| SchedulerError::UnknownRecurring(recurring_id.to_owned()))?;

        let now = Utc::now();
        let options = self.options_for(&recurring.target);
        let job = Job::new(
            &recurring.target,
            recurring.args,
            options.queue,
            now,
            self.max_attempts(),
            options.on_dead,
            now,
        );
        let id = job.id;

        self.engine.insert_job(&job).await?;
        info!(recurring_id, job = %id, "recurring job triggered");

        Ok(id)
    }

    pub async fn job(&self, id: Uuid) -> Result<Option<Job>> {
        self.engine.job_by_id(id).await
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let counts = self.engine.counts().await?;
        let history = self.engine.history(50).await?;
        let liveness_window =
            chrono::Duration::from_std(self.config.heartbeat_interval * 3).unwrap_or_default();
        let servers = self.engine.alive_servers(Utc::now() - liveness_window).await?;

        Ok(Dashboard {
            counts,
            history,
            servers,
        })
    }

    /// Moves due recurring schedules into the queue and advances their next
    /// run. Returns how many executions were planned.
    pub async fn plan_once(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.engine.due_recurring(now).await?;
        let mut planned = 0;

        for recurring in due {
            let next = match CronExpr::parse(&recurring.cron) {
                Ok(expr) => expr.next_after(now),
                Err(e) => {
                    error!(recurring = %recurring.id, "unparseable cron, parking for a day: {e}");
                    None
                }
            };
            // a broken row must still move forward or the planner spins
            let next = next.unwrap_or(now + chrono::Duration::days(1));

            let options = self.options_for(&recurring.target);
            let job = Job::new(
                &recurring.target,
                recurring.args.clone(),
                options.queue,
                now,
                self.max_attempts(),
                options.on_dead,
                now,
            );

            self.engine.insert_job(&job).await?;
            self.engine.set_recurring_next(&recurring.id, next).await?;
            planned += 1;
        }

        Ok(planned)
    }

    /// Claims and runs at most one due job, scanning the lanes in priority
    /// order. Returns whether anything ran.
    pub async fn work_one(&self) -> Result<bool> {
        for queue in JobQueue::ALL {
            let mut claimed = self
                .engine
                .fetch_due(queue, 1, self.config.invisibility_timeout, Utc::now())
                .await?;

            if let Some(job) = claimed.pop() {
                self.process(job).await?;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Drains everything currently due. Used by tests and the worker loops.
    pub async fn work_once(&self) -> Result<usize> {
        let mut processed = 0;

        while self.work_one().await? {
            processed += 1;
        }

        Ok(processed)
    }

    async fn process(&self, mut job: Job) -> Result<()> {
        let now = Utc::now();

        let outcome = match self.registry.get(&job.target) {
            Some(registered) => registered.handler.run(&job.args).await.map(|_| ()),
            None => Err(anyhow::anyhow!("no handler registered for `{}`", job.target)),
        };

        match outcome {
            Ok(()) => {
                job.state = JobState::Succeeded;
                job.invisible_until = None;
                job.last_error = None;
                job.updated_at = now;
                self.engine.update_job(&job).await?;
                debug!(target = %job.target, job = %job.id, "job succeeded");
            }
            Err(e) => {
                job.last_error = Some(e.to_string());
                job.updated_at = now;

                if job.attempts >= job.max_attempts {
                    warn!(
                        target = %job.target,
                        job = %job.id,
                        attempts = job.attempts,
                        "job exhausted its attempts: {e}"
                    );

                    if let Some(alert) = &self.alert {
                        alert.job_dead(&job).await;
                    }

                    match job.on_dead {
                        DeadAction::Delete => {
                            self.engine.delete_job(job.id).await?;
                        }
                        DeadAction::Keep => {
                            job.state = JobState::Dead;
                            job.invisible_until = None;
                            self.engine.update_job(&job).await?;
                        }
                    }
                } else {
                    debug!(
                        target = %job.target,
                        job = %job.id,
                        attempt = job.attempts,
                        "job failed, retrying: {e}"
                    );
                    job.state = JobState::Retrying;
                    job.invisible_until = None;
                    job.run_at = now
                        + chrono::Duration::from_std(self.config.retry_backoff)
                            .unwrap_or_default();
                    self.engine.update_job(&job).await?;
                }
            }
        }

        Ok(())
    }

    /// Spawns the planner, the worker pool and the heartbeat. Workers finish
    /// the job in flight when the token fires.
    pub fn start(&self, token: CancellationToken) -> JoinHandle<()> {
        let mut handles = Vec::with_capacity(self.config.worker_count + 2);

        handles.push(self.spawn_planner(token.clone()));
        handles.push(self.spawn_heartbeat(token.clone()));

        for worker in 0..self.config.worker_count {
            handles.push(self.spawn_worker(worker, token.clone()));
        }

        info!(
            workers = self.config.worker_count,
            server = %self.config.server_name,
            "scheduler started"
        );

        tokio::spawn(async move {
            join_all(handles).await;
        })
    }

    fn spawn_planner(&self, token: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();

        tokio::spawn(async move {
            let period = scheduler.config.poll_interval;
            let mut interval = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.plan_once().await {
                            error!("recurring planner failed: {e}");
                        }
                    }
                }
            }
        })
    }

    fn spawn_worker(&self, worker: usize, token: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();

        tokio::spawn(async move {
            let period = scheduler.config.poll_interval;
            let mut interval = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        loop {
                            match scheduler.work_one().await {
                                Ok(true) => continue,
                                Ok(false) => break,
                                Err(e) => {
                                    error!(worker, "worker iteration failed: {e}");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    fn spawn_heartbeat(&self, token: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();

        tokio::spawn(async move {
            let period = scheduler.config.heartbeat_interval;
            let mut interval = interval_at(Instant::now(), period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let server = scheduler.config.server_name.clone();

                        if let Err(e) = scheduler.engine.heartbeat(&server, Utc::now()).await {
                            error!("heartbeat failed: {e}");
                        }
                    }
                }
            }
        })
    }
}
