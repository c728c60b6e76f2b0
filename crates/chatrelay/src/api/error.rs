//! API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use chatrelay_protocol::ValidationError;

use crate::upstream::UpstreamError;

/// Message shown to clients for any failure before streaming starts.
pub const GENERIC_FAILURE: &str = "Failed to process chat request";

/// API error type with structured responses.
///
/// Only failures that happen before the response head is written end up here.
/// Failures after that point terminate the body instead.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input. The message is returned verbatim.
    #[error("{0}")]
    BadRequest(String),

    /// Upstream or configuration not ready; no stream was opened.
    #[error("{message}")]
    Unavailable {
        message: String,
        details: Option<String>,
    },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>, details: Option<String>) -> Self {
        Self::Unavailable {
            message: msg.into(),
            details,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
            }
            ApiError::Unavailable { message, details } => {
                warn!(error_code = code, message = %message, details = ?details, "Upstream unavailable");
            }
            ApiError::BadRequest(msg) => {
                debug!(error_code = code, message = %msg, "Client error");
            }
        }

        let body = match self {
            ApiError::Unavailable { message, details } => ErrorResponse {
                error: message,
                code,
                details,
            },
            other => ErrorResponse {
                error: other.to_string(),
                code,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Configuration problems stay in the server log; the client gets the generic
/// message. Provider rejections carry the provider's explanation as details.
impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        if err.is_config() {
            error!(error = %err, "Relay is not configured for upstream calls");
            return Self::unavailable(GENERIC_FAILURE, None);
        }

        let details = match err {
            UpstreamError::Rejected { message, .. } => message,
            other => other.to_string(),
        };
        Self::unavailable(GENERIC_FAILURE, Some(details))
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
