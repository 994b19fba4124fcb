//! Error types and handling
//!
//! Every failure surfaced to a client is rendered as a JSON envelope of the
//! form `{"error": <string|map>}`. Server-side causes are logged here and
//! never echoed back.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Generic message returned for any 5xx response.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Authorization header present but not of the form `Bearer <token>`,
    /// or the token is syntactically invalid (401)
    #[error("malformed authentication credential")]
    InvalidCredentialFormat,

    /// Token absent from the store or expired; the two are never told apart (401)
    #[error("authentication credential not found")]
    CredentialNotFound,

    /// Anonymous identity reached a route that needs a user (401)
    #[error("authentication required")]
    NotAuthenticated,

    /// Known user whose account has not been activated yet (403)
    #[error("account not activated")]
    NotActivated,

    /// Activated user lacking the route's permission code (403)
    #[error("permission denied")]
    NotPermitted,

    /// Client exceeded its request budget (429)
    #[error("rate limit exceeded")]
    RateLimited,

    /// Email/password pair did not match a user (401)
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// Malformed request body or parameters (400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("not found")]
    NotFound,

    /// Route exists but not for this method (405)
    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(String),

    /// Optimistic concurrency check failed (409)
    #[error("edit conflict")]
    EditConflict,

    /// Input failed validation (422); keyed by field name
    #[error("validation failed")]
    FailedValidation(BTreeMap<String, String>),

    /// Storage or entropy backend failure (500)
    #[error("backend failure: {0}")]
    Backend(#[from] StoreError),

    /// Any other internal failure (500)
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error envelope
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: serde_json::Value,
}

impl ErrorResponse {
    /// Envelope carrying a plain message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: serde_json::Value::String(message.into()),
        }
    }

    /// Envelope carrying a field → message map
    pub fn fields(fields: &BTreeMap<String, String>) -> Self {
        Self {
            error: serde_json::to_value(fields).unwrap_or_default(),
        }
    }
}

impl AppError {
    /// HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentialFormat
            | AppError::CredentialNotFound
            | AppError::NotAuthenticated
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotActivated | AppError::NotPermitted => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Backend(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.to_string());
        AppError::FailedValidation(errors)
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidCredentialFormat | AppError::CredentialNotFound => {
                "invalid or missing authentication token".to_string()
            }
            AppError::NotAuthenticated => {
                "you must be authenticated to access this resource".to_string()
            }
            AppError::NotActivated => {
                "your user account must be activated to access this resource".to_string()
            }
            AppError::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string()
            }
            AppError::RateLimited => "rate limit exceeded".to_string(),
            AppError::InvalidCredentials => "invalid authentication credentials".to_string(),
            AppError::BadRequest(message) => message.clone(),
            AppError::NotFound => "the requested resource could not be found".to_string(),
            AppError::MethodNotAllowed(_) => self.to_string(),
            AppError::EditConflict => {
                "unable to update the record due to an edit conflict, please try again".to_string()
            }
            AppError::FailedValidation(_) => self.to_string(),
            AppError::Backend(_) | AppError::Internal(_) => SERVER_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = match &self {
            AppError::FailedValidation(fields) => ErrorResponse::fields(fields),
            other => ErrorResponse::message(other.client_message()),
        };

        let mut response = (status, Json(body)).into_response();

        match self {
            AppError::InvalidCredentialFormat | AppError::CredentialNotFound => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            AppError::RateLimited => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            }
            _ => {}
        }

        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
