use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentraError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("no operator capacity: {0}")]
    CapacityExhausted(String),

    #[error("downstream unavailable: {0}")]
    Downstream(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SentraError>;

impl From<sqlx::Error> for SentraError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".to_string()),
            other => Self::Downstream(format!("database error: {other}")),
        }
    }
}

impl From<redis::RedisError> for SentraError {
    fn from(err: redis::RedisError) -> Self {
        Self::Downstream(format!("cache error: {err}"))
    }
}

impl From<tokio::time::error::Elapsed> for SentraError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Downstream("operation timed out".to_string())
    }
}
