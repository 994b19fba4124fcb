//! Token issuing endpoints

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    db::{StoreError, UserRepository},
    models::{TokenScope, User},
    services::{auth, tokens, Email},
    utils::{
        validation::{validate_email, validate_password_plaintext},
        AppError, JsonBody, Validator,
    },
    AppState,
};

/// Create routes for token endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/authentication", post(create_authentication_token))
        .route("/activation", post(create_activation_token))
        .route("/password-reset", post(create_password_reset_token))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmailRequest {
    #[serde(default)]
    email: String,
}

async fn user_for_email(state: &AppState, email: &str) -> Result<User, AppError> {
    match UserRepository::new(&state.db).get_by_email(email).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => Err(AppError::invalid_field(
            "email",
            "no matching email address found",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Exchange email and password for an authentication token
async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &payload.email);
    validate_password_plaintext(&mut v, &payload.password);
    v.finish()?;

    let user = match UserRepository::new(&state.db).get_by_email(&payload.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !auth::verify_password_async(payload.password, user.password_hash.clone()).await? {
        debug!(user_id = user.id, "Password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    let token = tokens::issue(
        state.identity_store.as_ref(),
        user.id,
        TokenScope::Authentication,
    )
    .await?;

    info!(user_id = user.id, "Authentication token issued");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

/// Re-send an activation token to a not yet activated user
async fn create_activation_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &payload.email);
    v.finish()?;

    let user = user_for_email(&state, &payload.email).await?;
    if user.activated {
        return Err(AppError::invalid_field("email", "user has already been activated"));
    }

    let token = tokens::issue(state.identity_store.as_ref(), user.id, TokenScope::Activation).await?;
    state.send_email_in_background(user.email, Email::activation(&token.plaintext));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "an email will be sent to you containing activation instructions" })),
    ))
}

/// Issue a short-lived password reset token to an activated user
async fn create_password_reset_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &payload.email);
    v.finish()?;

    let user = user_for_email(&state, &payload.email).await?;
    if !user.activated {
        return Err(AppError::invalid_field("email", "user account must be activated"));
    }

    let token = tokens::issue(
        state.identity_store.as_ref(),
        user.id,
        TokenScope::PasswordReset,
    )
    .await?;
    state.send_email_in_background(user.email, Email::password_reset(&token.plaintext));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "an email will be sent to you containing password reset instructions" })),
    ))
}
