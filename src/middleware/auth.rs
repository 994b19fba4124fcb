//! Bearer token authentication
//!
//! Runs on every request. Binds exactly one [`Identity`] into the request
//! extensions: the anonymous sentinel when no `Authorization` header is sent,
//! otherwise the user owning the presented authentication token.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, VARY},
        request::Parts,
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    db::StoreError,
    models::{validate_token_plaintext, Identity, TokenScope},
    services::{tokens, IdentityStore},
    utils::{AppError, Validator},
    AppState,
};

/// Split `Bearer <token>`; any other shape is rejected
fn extract_bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Map an `Authorization` header value (or its absence) to an identity
///
/// An empty header value counts as absent.
pub async fn resolve_identity(
    store: &dyn IdentityStore,
    header: Option<&HeaderValue>,
) -> Result<Identity, AppError> {
    let Some(header) = header.filter(|h| !h.is_empty()) else {
        return Ok(Identity::Anonymous);
    };

    let header = header
        .to_str()
        .map_err(|_| AppError::InvalidCredentialFormat)?;
    let token = extract_bearer_token(header).ok_or(AppError::InvalidCredentialFormat)?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, token);
    if !v.is_valid() {
        return Err(AppError::InvalidCredentialFormat);
    }

    match tokens::resolve(store, token, TokenScope::Authentication).await {
        Ok(user) => Ok(Identity::User(user)),
        Err(StoreError::NotFound) => Err(AppError::CredentialNotFound),
        Err(e) => Err(AppError::Backend(e)),
    }
}

/// Authentication middleware
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request.headers().get(AUTHORIZATION).cloned();
    let resolved = resolve_identity(state.identity_store.as_ref(), header.as_ref()).await;

    let mut response = match resolved {
        Ok(identity) => {
            debug!(user_id = identity.user_id(), "Identity bound");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    };

    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Identity bound by [`authenticate`]
///
/// # Panics
///
/// If the authentication layer did not run for this request.
pub fn request_identity(request: &Request) -> &Identity {
    request
        .extensions()
        .get::<Identity>()
        .expect("identity requested before the authentication middleware ran")
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .expect("identity requested before the authentication middleware ran"))
    }
}
