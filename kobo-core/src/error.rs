use crate::value_object::{AccountNumber, Money};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{entity} `{key}` does not exist")]
    NotFound { entity: &'static str, key: String },

    #[error("insufficient funds on {account_number}: requested {requested}, available {available}")]
    InsufficientFunds {
        account_number: AccountNumber,
        requested: Money,
        available: Money,
    },

    #[error("monthly withdrawal limit of {limit} reached on {account_number}")]
    WithdrawalLimit {
        account_number: AccountNumber,
        limit: u32,
    },

    #[error("the record was modified by another operation, retry")]
    Conflict,

    #[error("{0}")]
    InvalidOperation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
