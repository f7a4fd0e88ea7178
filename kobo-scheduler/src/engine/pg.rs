use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::Result;
use crate::job::{Job, JobCounts, JobQueue, JobState, RecurringJob};

#[derive(Debug, Clone)]
pub struct Pg {
    pool: PgPool,
}

impl Pg {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    queue: String,
    target: String,
    args: serde_json::Value,
    state: String,
    attempts: i32,
    max_attempts: i32,
    run_at: DateTime<Utc>,
    invisible_until: Option<DateTime<Utc>>,
    last_error: Option<String>,
    on_dead: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RecurringRow {
    id: String,
    cron: String,
    target: String,
    args: serde_json::Value,
    next_run: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn job_from_row(row: JobRow) -> Result<Job> {
    Ok(Job {
        id: row.id,
        queue: row
            .queue
            .parse()
            .map_err(|e| anyhow!("invalid job queue: {e}"))?,
        target: row.target,
        args: row.args,
        state: row
            .state
            .parse()
            .map_err(|e| anyhow!("invalid job state: {e}"))?,
        attempts: row.attempts,
        max_attempts: row.max_attempts,
        run_at: row.run_at,
        invisible_until: row.invisible_until,
        last_error: row.last_error,
        on_dead: row
            .on_dead
            .parse()
            .map_err(|e| anyhow!("invalid dead action: {e}"))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn recurring_from_row(row: RecurringRow) -> RecurringJob {
    RecurringJob {
        id: row.id,
        cron: row.cron,
        target: row.target,
        args: row.args,
        next_run: row.next_run,
        updated_at: row.updated_at,
    }
}

#[async_trait]
impl Engine for Pg {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_jobs
              (id, queue, target, args, state, attempts, max_attempts, run_at,
               invisible_until, last_error, on_dead, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id)
        .bind(job.queue.to_string())
        .bind(&job.target)
        .bind(&job.args)
        .bind(job.state.to_string())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.run_at)
        .bind(job.invisible_until)
        .bind(&job.last_error)
        .bind(job.on_dead.to_string())
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduler_jobs
            SET state = $2, attempts = $3, run_at = $4, invisible_until = $5,
                last_error = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.state.to_string())
        .bind(job.attempts)
        .bind(job.run_at)
        .bind(job.invisible_until)
        .bind(&job.last_error)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduler_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn job_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM scheduler_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(job_from_row).transpose()
    }

    async fn fetch_due(
        &self,
        queue: JobQueue,
        limit: u32,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>> {
        let lease_until = now + chrono::Duration::from_std(lease).unwrap_or_default();

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE scheduler_jobs
            SET state = 'Processing', attempts = attempts + 1,
                invisible_until = $3, updated_at = $2
            WHERE id IN (
                SELECT id FROM scheduler_jobs
                WHERE queue = $1 AND (
                    (state IN ('Enqueued', 'Retrying') AND run_at <= $2)
                    OR (state = 'Processing' AND invisible_until < $2)
                )
                ORDER BY run_at ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(queue.to_string())
        .bind(now)
        .bind(lease_until)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(job_from_row).collect()
    }

    async fn upsert_recurring(&self, recurring: &RecurringJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_recurring (id, cron, target, args, next_run, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET cron = EXCLUDED.cron, target = EXCLUDED.target,
                args = EXCLUDED.args, next_run = EXCLUDED.next_run,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&recurring.id)
        .bind(&recurring.cron)
        .bind(&recurring.target)
        .bind(&recurring.args)
        .bind(recurring.next_run)
        .bind(recurring.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_recurring(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduler_recurring WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recurring_by_id(&self, id: &str) -> Result<Option<RecurringJob>> {
        let row =
            sqlx::query_as::<_, RecurringRow>("SELECT * FROM scheduler_recurring WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(recurring_from_row))
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<RecurringJob>> {
        let rows = sqlx::query_as::<_, RecurringRow>(
            "SELECT * FROM scheduler_recurring WHERE next_run <= $1 ORDER BY next_run ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(recurring_from_row).collect())
    }

    async fn set_recurring_next(&self, id: &str, next_run: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE scheduler_recurring SET next_run = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(next_run)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let scheduled: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scheduler_recurring")
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM scheduler_jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts {
            scheduled: scheduled.0 as u64,
            ..JobCounts::default()
        };

        for (state, count) in rows {
            let count = count as u64;

            match state.parse().map_err(|e| anyhow!("invalid job state: {e}"))? {
                JobState::Created | JobState::Enqueued => counts.enqueued += count,
                JobState::Processing => counts.processing += count,
                JobState::Succeeded => counts.succeeded += count,
                JobState::Retrying => counts.retrying += count,
                JobState::Dead => counts.failed += count,
            }
        }

        Ok(counts)
    }

    async fn history(&self, limit: u32) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM scheduler_jobs ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(job_from_row).collect()
    }

    async fn heartbeat(&self, server: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_servers (name, last_seen)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(server)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn alive_servers(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM scheduler_servers WHERE last_seen >= $1 ORDER BY name ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
