//! Token issuing and resolution

use chrono::Utc;
use tracing::debug;

use crate::{
    db::StoreError,
    models::{fingerprint, Token, TokenScope, User, TOKEN_PLAINTEXT_LEN},
    services::identity::IdentityStore,
};

/// Generate a token for `user_id` in `scope` and persist its fingerprint
pub async fn issue(
    store: &dyn IdentityStore,
    user_id: i64,
    scope: TokenScope,
) -> Result<Token, StoreError> {
    let token = Token::generate(user_id, scope.ttl(), scope)?;
    store.insert_token(&token).await?;
    debug!(user_id, scope = %scope, expiry = %token.expiry, "Issued token");
    Ok(token)
}

/// Resolve a plaintext to its owner.
///
/// Unknown, wrong-scope, expired and malformed plaintexts all come back as
/// [`StoreError::NotFound`]; other errors are storage failures. A plaintext of
/// the wrong length never reaches the store.
pub async fn resolve(
    store: &dyn IdentityStore,
    plaintext: &str,
    scope: TokenScope,
) -> Result<User, StoreError> {
    if plaintext.len() != TOKEN_PLAINTEXT_LEN {
        return Err(StoreError::NotFound);
    }

    let record = store.find_token(&fingerprint(plaintext), scope).await?;
    if record.is_expired_at(Utc::now()) {
        return Err(StoreError::NotFound);
    }

    store.load_user(record.user_id).await
}
