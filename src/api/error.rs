//! API error types
//!
//! Maps pipeline failures onto status codes and caller-safe bodies. Internal
//! detail is logged where the failure is handled and never sent back.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::application::scrape_orchestrator::ScrapeError;
use crate::application::trigger_gate::TriggerError;
use crate::domain::repositories::StoreError;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid or no api key")]
    Unauthorized,

    #[error("too many trigger requests, try again later")]
    RateLimited,

    #[error("a scrape run is already in progress")]
    RunInProgress,

    #[error("source page could not be fetched")]
    FetchFailed,

    #[error("sample could not be stored")]
    StoreWriteFailed,

    #[error("something wrong happened on backend")]
    StoreReadFailed,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::RunInProgress => StatusCode::CONFLICT,
            Self::FetchFailed => StatusCode::BAD_GATEWAY,
            Self::StoreWriteFailed | Self::StoreReadFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::RunInProgress => "RUN_IN_PROGRESS",
            Self::FetchFailed => "FETCH_FAILED",
            Self::StoreWriteFailed => "STORE_WRITE_FAILED",
            Self::StoreReadFailed => "STORE_READ_FAILED",
        }
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Unauthorized => Self::Unauthorized,
            TriggerError::RateLimited => Self::RateLimited,
            TriggerError::Busy | TriggerError::RunFailed(ScrapeError::RunInProgress) => Self::RunInProgress,
            TriggerError::RunFailed(ScrapeError::Fetch(_)) => Self::FetchFailed,
            TriggerError::RunFailed(ScrapeError::Store(_)) => Self::StoreWriteFailed,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_write() { Self::StoreWriteFailed } else { Self::StoreReadFailed }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };

        tracing::debug!(error_code = body.error, status = %status, "API error");

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
