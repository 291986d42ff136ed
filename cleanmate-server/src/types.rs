//! Server error type and its HTTP mapping.

use hyper::StatusCode;
use serde_json::json;
use thiserror::Error;

use cleanmate_agent::{LlmError, ServiceError};

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Model failure on an endpoint that always answers 502 for it
    #[error("Upstream model error: {0}")]
    Upstream(LlmError),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Service(err) => match err {
                ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::NoBackendConfigured => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::Backend(_) if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::Backend(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Whether the client may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(err) => err.is_retryable(),
            Self::Upstream(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// JSON error body.
    pub fn to_json(&self) -> serde_json::Value {
        let status = self.status();
        json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        })
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
