use kobo_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stale concurrency token, the row changed under us")]
    Concurrency,

    #[error("{0}")]
    Core(#[from] CoreError),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Concurrency => CoreError::Conflict,
            StoreError::Core(core) => core,
            other => CoreError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
