//! Layered authorization
//!
//! Checks run in a fixed order and stop at the first failure:
//! authenticated (401), then activated (403), then permitted (403).
//! The permission set is only loaded once the first two have passed.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    middleware::auth::request_identity,
    models::{Identity, User},
    services::IdentityStore,
    utils::AppError,
    AppState,
};

pub fn require_authenticated(identity: &Identity) -> Result<&User, AppError> {
    identity.user().ok_or(AppError::NotAuthenticated)
}

pub fn require_activated(identity: &Identity) -> Result<&User, AppError> {
    let user = require_authenticated(identity)?;
    if !user.activated {
        return Err(AppError::NotActivated);
    }
    Ok(user)
}

/// Full check for a route guarded by `code`
pub async fn require_permission<'a>(
    store: &dyn IdentityStore,
    identity: &'a Identity,
    code: &str,
) -> Result<&'a User, AppError> {
    let user = require_activated(identity)?;
    let permissions = store.load_permissions(user.id).await?;
    if !permissions.includes(code) {
        debug!(
            user_id = user.id,
            permission = code,
            granted = permissions.len(),
            "Permission denied"
        );
        return Err(AppError::NotPermitted);
    }
    Ok(user)
}

/// Route layer: any authenticated user
pub async fn authenticated_user_middleware(request: Request, next: Next) -> Response {
    if let Err(e) = require_authenticated(request_identity(&request)) {
        return e.into_response();
    }
    next.run(request).await
}

/// Route layer: authenticated and activated
pub async fn activated_user_middleware(request: Request, next: Next) -> Response {
    if let Err(e) = require_activated(request_identity(&request)) {
        return e.into_response();
    }
    next.run(request).await
}

/// Route layer: activated and holding `code`
pub async fn permission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
    code: &'static str,
) -> Response {
    let identity = request_identity(&request).clone();
    let checked = require_permission(state.identity_store.as_ref(), &identity, code).await;

    match checked {
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Route layer requiring permission `$code`
///
/// ```ignore
/// get(list_movies).route_layer(require_permission!(state, MOVIES_READ))
/// ```
#[macro_export]
macro_rules! require_permission {
    ($state:expr, $code:expr) => {
        axum::middleware::from_fn_with_state(
            $state.clone(),
            move |state: axum::extract::State<$crate::AppState>,
                  req: axum::extract::Request,
                  next: axum::middleware::Next| {
                $crate::middleware::authorization::permission_middleware(state, req, next, $code)
            },
        )
    };
}
