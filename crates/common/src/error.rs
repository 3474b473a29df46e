use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dependency error: {0}")]
    Dependency(String),

    /// One or more channels failed during a send; the notification was persisted as `Failed`.
    #[error("failed to send to {failed} channels")]
    PartialDelivery { failed: usize, total: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error comes from a collaborator (validator, storage, cache)
    /// rather than from the caller's input.
    pub fn is_dependency(&self) -> bool {
        matches!(
            self,
            AppError::Dependency(_) | AppError::Database(_) | AppError::Redis(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Dependency(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::PartialDelivery { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Redis(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_delivery_message() {
        let err = AppError::PartialDelivery {
            failed: 2,
            total: 3,
        };
        assert_eq!(err.to_string(), "failed to send to 2 channels");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Dependency("x".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::PartialDelivery {
                    failed: 1,
                    total: 2,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_dependency_grouping() {
        assert!(AppError::Dependency("validator down".into()).is_dependency());
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_dependency());
        assert!(!AppError::Validation("x".into()).is_dependency());
    }
}
