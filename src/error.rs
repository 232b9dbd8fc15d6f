use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether responses may carry internal error detail (debug deployments only)
static EXPOSE_INTERNAL: AtomicBool = AtomicBool::new(false);

/// Set once at startup from config; outside debug mode internal error text
/// stays in the logs
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL.store(enabled, Ordering::Relaxed);
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures are retried once with backoff at the repository
    /// seams before surfacing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Cache(_)
                | AppError::HttpClient(_)
                | AppError::Upstream(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let expose = EXPOSE_INTERNAL.load(Ordering::Relaxed);

        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(_) | AppError::HttpClient(_) => {
                tracing::error!(error = %self, "Upstream dependency failed");
                let msg = if expose {
                    self.to_string()
                } else {
                    "upstream dependency unavailable".to_string()
                };
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
                let msg = if expose {
                    self.to_string()
                } else {
                    "internal server error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_not_transient() {
        assert!(!AppError::NotFound("x".to_string()).is_transient());
        assert!(!AppError::InvalidArgument("x".to_string()).is_transient());
        assert!(AppError::Upstream("history service".to_string()).is_transient());
    }

    #[test]
    fn test_status_mapping() {
        let resp = AppError::NotFound("no such item".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::InvalidArgument("limit must be positive".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Upstream("catalog".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
