//! Identity lookups used by the request pipeline
//!
//! The authentication and authorization layers only talk to storage through
//! [`IdentityStore`], so tests can substitute fakes that count calls or fail
//! on demand.

use async_trait::async_trait;

use crate::{
    db::{DbPool, PermissionRepository, StoreError, TokenRepository, UserRepository},
    models::{Fingerprint, Permissions, Token, TokenRecord, TokenScope, User},
};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Token row for an exact fingerprint and scope, expired or not
    async fn find_token(
        &self,
        fingerprint: &Fingerprint,
        scope: TokenScope,
    ) -> Result<TokenRecord, StoreError>;

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    async fn load_user(&self, user_id: i64) -> Result<User, StoreError>;

    async fn load_permissions(&self, user_id: i64) -> Result<Permissions, StoreError>;
}

/// [`IdentityStore`] backed by the SQLite repositories
#[derive(Clone)]
pub struct SqlIdentityStore {
    pool: DbPool,
}

impl SqlIdentityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for SqlIdentityStore {
    async fn find_token(
        &self,
        fingerprint: &Fingerprint,
        scope: TokenScope,
    ) -> Result<TokenRecord, StoreError> {
        TokenRepository::new(&self.pool).find(fingerprint, scope).await
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        TokenRepository::new(&self.pool).insert(token).await
    }

    async fn load_user(&self, user_id: i64) -> Result<User, StoreError> {
        UserRepository::new(&self.pool).get_by_id(user_id).await
    }

    async fn load_permissions(&self, user_id: i64) -> Result<Permissions, StoreError> {
        PermissionRepository::new(&self.pool)
            .get_all_for_user(user_id)
            .await
    }
}
