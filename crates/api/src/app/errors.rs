//! Consistent error responses.
//!
//! Handlers return `Result<_, ApiError>`; everything that is not an expected
//! business outcome funnels through here and leaves as a JSON envelope.

use std::any::Any;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use userhub_core::DomainError;
use userhub_infra::StoreError;

use crate::app::envelope::ApiResponse;

pub const RATE_LIMITED: &str = "Too many requests, please try again later.";
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("email exists")]
    EmailExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid user id")]
    InvalidUserId,

    #[error("{0}")]
    Validation(String),

    /// The request body could not be turned into the expected JSON.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("route not found")]
    RouteNotFound,

    /// Anything unexpected; the detail is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmailExists
            | ApiError::InvalidUserId
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UserNotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Internal(_) => INTERNAL_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        json_error(self.status(), self.client_message())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::EmailExists,
            StoreError::Validation(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::InvalidId(_) => ApiError::InvalidUserId,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::BAD_REQUEST
            }
            other => other.status(),
        };
        ApiError::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

/// Build an error envelope response.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    ApiResponse::<()>::error(status, message).into_response()
}

/// Last-resort handler for panics inside the service stack.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");

    json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
}
