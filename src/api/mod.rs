//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{
    http::Method,
    routing::get,
    Router,
};

use crate::{db::StoreError, utils::AppError, AppState};

mod debug;
mod health;
mod movies;
mod tokens;
mod users;

pub use debug::debug_vars;
pub use health::healthcheck;

/// Create the full route tree
///
/// Movie routes carry their permission checks as route layers, so the state
/// is needed up front.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/healthcheck", get(health::healthcheck))
        .nest("/v1/movies", movies::routes(state))
        .nest("/v1/users", users::routes())
        .nest("/v1/tokens", tokens::routes())
        .route("/debug/vars", get(debug::debug_vars))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

/// Storage outcome as seen by a handler
pub(crate) fn store_error(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound,
        StoreError::EditConflict => AppError::EditConflict,
        other => AppError::Backend(other),
    }
}

/// `{id}` path segment; anything that is not a positive integer is a 404
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}
