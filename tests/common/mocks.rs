//! Identity store fakes
//!
//! Wrap the real store to observe or break the lookups the request pipeline
//! makes.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;

use greenlight::{
    db::StoreError,
    models::{Fingerprint, Permissions, Token, TokenRecord, TokenScope, User},
    services::IdentityStore,
};

/// Counts token and permission lookups, optionally failing them
pub struct CountingStore {
    inner: Arc<dyn IdentityStore>,
    token_lookups: AtomicUsize,
    permission_lookups: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_permissions: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn IdentityStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            token_lookups: AtomicUsize::new(0),
            permission_lookups: AtomicUsize::new(0),
            fail_lookups: AtomicBool::new(false),
            fail_permissions: AtomicBool::new(false),
        })
    }

    pub fn token_lookups(&self) -> usize {
        self.token_lookups.load(Ordering::SeqCst)
    }

    pub fn permission_lookups(&self) -> usize {
        self.permission_lookups.load(Ordering::SeqCst)
    }

    /// Make token and permission lookups time out from now on
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    /// Make only permission lookups time out; authentication keeps working
    pub fn fail_permission_lookups(&self) {
        self.fail_permissions.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) || flag.load(Ordering::SeqCst) {
            Err(StoreError::timeout())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityStore for CountingStore {
    async fn find_token(
        &self,
        fingerprint: &Fingerprint,
        scope: TokenScope,
    ) -> Result<TokenRecord, StoreError> {
        self.token_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_failure(&self.fail_lookups)?;
        self.inner.find_token(fingerprint, scope).await
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        self.inner.insert_token(token).await
    }

    async fn load_user(&self, user_id: i64) -> Result<User, StoreError> {
        self.inner.load_user(user_id).await
    }

    async fn load_permissions(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_failure(&self.fail_permissions)?;
        self.inner.load_permissions(user_id).await
    }
}
