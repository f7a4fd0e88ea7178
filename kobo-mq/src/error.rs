use kobo_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MqError {
    #[error("store `{0}`")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MqError>;
