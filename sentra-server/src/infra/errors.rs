use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use sentra_core::SentraError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

// Convert from various error types
impl From<SentraError> for AppError {
    fn from(err: SentraError) -> Self {
        match err {
            SentraError::Validation(msg) => Self::bad_request(msg),
            SentraError::NotFound(msg) => Self::not_found(msg),
            SentraError::StateConflict(msg) => Self::conflict(msg),
            SentraError::CapacityExhausted(msg) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            SentraError::Downstream(msg) => {
                tracing::error!(error = %msg, "downstream dependency failed");
                Self::new(StatusCode::BAD_GATEWAY, "Upstream dependency failed")
            }
            SentraError::Serialization(err) => {
                tracing::error!(error = %err, "serialization failed");
                Self::internal("Serialization failed")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = ?err, "database operation failed");
        Self::internal("Database operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (SentraError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (SentraError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (SentraError::StateConflict("s".into()), StatusCode::CONFLICT),
            (
                SentraError::CapacityExhausted("c".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SentraError::Downstream("d".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
