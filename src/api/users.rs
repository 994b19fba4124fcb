//! User account endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::store_error;
use crate::{
    db::{PermissionRepository, StoreError, TokenRepository, UserRepository},
    models::{validate_token_plaintext, RegisterUserRequest, TokenScope, User, MOVIES_READ},
    services::{auth, tokens, Email},
    utils::{validation::validate_password_plaintext, AppError, JsonBody, Validator},
    AppState,
};

/// Create routes for user endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register_user))
        .route("/activated", put(activate_user))
        .route("/password", put(update_password))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivateRequest {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PasswordResetRequest {
    #[serde(default)]
    password: String,
    #[serde(default)]
    token: String,
}

/// Register a new user and email them an activation token
async fn register_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut v = Validator::new();
    payload.validate(&mut v);
    v.finish()?;

    let password_hash = auth::hash_password_async(payload.password).await?;
    let mut user = User::new(payload.name, payload.email, password_hash);

    match UserRepository::new(&state.db).insert(&mut user).await {
        Ok(()) => {}
        Err(StoreError::DuplicateEmail) => {
            return Err(AppError::invalid_field(
                "email",
                "a user with this email address already exists",
            ))
        }
        Err(e) => return Err(e.into()),
    }

    PermissionRepository::new(&state.db)
        .add_for_user(user.id, &[MOVIES_READ])
        .await?;

    let token = tokens::issue(state.identity_store.as_ref(), user.id, TokenScope::Activation).await?;

    info!(user_id = user.id, "User registered");
    state.send_email_in_background(user.email.clone(), Email::welcome(user.id, &token.plaintext));

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

/// Activate the account owning an activation token
async fn activate_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<Json<Value>, AppError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &payload.token);
    v.finish()?;

    let mut user = match tokens::resolve(
        state.identity_store.as_ref(),
        &payload.token,
        TokenScope::Activation,
    )
    .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(AppError::invalid_field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    UserRepository::new(&state.db)
        .update(&mut user)
        .await
        .map_err(store_error)?;

    TokenRepository::new(&state.db)
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;

    info!(user_id = user.id, "User activated");
    Ok(Json(json!({ "user": user })))
}

/// Set a new password using a password-reset token
async fn update_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PasswordResetRequest>,
) -> Result<Json<Value>, AppError> {
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &payload.password);
    validate_token_plaintext(&mut v, &payload.token);
    v.finish()?;

    let mut user = match tokens::resolve(
        state.identity_store.as_ref(),
        &payload.token,
        TokenScope::PasswordReset,
    )
    .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(AppError::invalid_field(
                "token",
                "invalid or expired password reset token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.password_hash = auth::hash_password_async(payload.password).await?;
    UserRepository::new(&state.db)
        .update(&mut user)
        .await
        .map_err(store_error)?;

    TokenRepository::new(&state.db)
        .delete_all_for_user(TokenScope::PasswordReset, user.id)
        .await?;

    info!(user_id = user.id, "Password reset");
    Ok(Json(json!({ "message": "your password was successfully reset" })))
}
