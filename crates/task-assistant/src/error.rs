//! Error Types for the Task Store

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid task identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Task store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt task record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIdentifier(id) => {
                Self::ToolValidation(format!("invalid task id '{id}'"))
            }
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => Self::Corrupt(err.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}
