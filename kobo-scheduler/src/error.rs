#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression `{expr}`: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("no handler registered for job target `{0}`")]
    UnknownTarget(String),

    #[error("recurring job `{0}` does not exist")]
    UnknownRecurring(String),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
