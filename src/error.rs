use std::time::SystemTime;

use axum::{
    Json,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, dto::epoch_millis, rate_limit::RateLimitDecision};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Caller exceeded a request limit or a per-round quota.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        remaining: u32,
        reset_at: SystemTime,
    },
}

impl ServiceError {
    /// Rejection derived from a denied limiter decision.
    pub fn rate_limited(message: impl Into<String>, decision: RateLimitDecision) -> Self {
        ServiceError::RateLimited {
            message: message.into(),
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { entity, .. } => {
                ServiceError::Conflict(format!("{entity} already exists"))
            }
            err @ StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Caller must slow down.
    #[error("too many requests: {message}")]
    TooManyRequests {
        message: String,
        remaining: u32,
        reset_at: SystemTime,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                error!(error = %source, "storage operation failed");
                AppError::ServiceUnavailable("storage unavailable".into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::RateLimited {
                message,
                remaining,
                reset_at,
            } => AppError::TooManyRequests {
                message,
                remaining,
                reset_at,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<u32>,
    /// Epoch milliseconds at which the limit resets.
    #[serde(skip_serializing_if = "Option::is_none")]
    reset: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let limit = match &self {
            AppError::TooManyRequests {
                remaining,
                reset_at,
                ..
            } => Some((*remaining, epoch_millis(*reset_at))),
            _ => None,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            remaining: limit.map(|(remaining, _)| remaining),
            reset: limit.map(|(_, reset)| reset),
        });

        let mut response = (status, payload).into_response();
        if let Some((remaining, reset)) = limit {
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use super::*;

    #[test]
    fn storage_conflicts_become_http_conflicts() {
        let err: ServiceError = StorageError::conflict("vote", "p/u").into();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_outage_is_opaque_503() {
        let source = StorageError::unavailable(
            "connection refused to 10.0.0.3".into(),
            io::Error::other("refused"),
        );
        let app: AppError = ServiceError::from(source).into();
        assert_eq!(app.to_string(), "service unavailable: storage unavailable");
        assert_eq!(app.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rate_limit_sets_headers() {
        let reset_at = SystemTime::UNIX_EPOCH + Duration::from_millis(1_234);
        let err = ServiceError::rate_limited(
            "slow down",
            RateLimitDecision {
                success: false,
                remaining: 0,
                reset_at,
            },
        );
        let response = AppError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1234");
    }

    #[test]
    fn invalid_state_maps_to_conflict() {
        let app: AppError = ServiceError::InvalidState("round closed".into()).into();
        assert_eq!(app.into_response().status(), StatusCode::CONFLICT);
    }
}
