//! Domain error taxonomy and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use shared::ValidationError;
use thiserror::Error;

/// Transport-independent failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Internal,
    /// A dependency failed its health check. Only the health endpoint reports it.
    Unavailable,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Everything the task service can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("task not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Carries the underlying cause for logs. Never sent to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound => ErrorKind::NotFound,
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: kind.status(),
            message: message.into(),
        }
    }

    pub fn invalid_payload() -> Self {
        Self::new(ErrorKind::Validation, "Invalid JSON payload")
    }

    pub fn missing_id(resource: &str) -> Self {
        Self::new(ErrorKind::Validation, format!("{resource} ID is required"))
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{resource} not found"))
    }

    /// Maps a service failure onto its response.
    ///
    /// `failure` is the generic message sent for internal errors; the real
    /// cause is logged here and goes no further.
    pub fn classify(error: ServiceError, resource: &str, failure: &str) -> Self {
        match error {
            ServiceError::Validation(validation) => {
                Self::new(ErrorKind::Validation, validation.to_string())
            }
            ServiceError::NotFound => Self::not_found(resource),
            ServiceError::Internal(cause) => {
                tracing::error!(error = %cause, "{failure}");
                Self::new(ErrorKind::Internal, failure)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
