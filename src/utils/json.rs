//! JSON request body extractor
//!
//! Wraps axum's `Json` so that decoding failures come back through the
//! standard error envelope instead of a plain-text rejection.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use super::error::AppError;

/// Maximum accepted request body, in bytes
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Decoded JSON request body
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::BadRequest(describe(&rejection))),
        }
    }
}

fn describe(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            format!("body contains incorrect JSON: {}", err.body_text())
        }
        JsonRejection::JsonSyntaxError(_) => "body contains badly-formed JSON".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "request must have a Content-Type of application/json".to_string()
        }
        JsonRejection::BytesRejection(_) => {
            format!("body must not be larger than {} bytes", MAX_BODY_BYTES)
        }
        other => other.body_text(),
    }
}
