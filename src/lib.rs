//! Greenlight movie catalog API
//!
//! JSON HTTP service over a movie catalog, gated by user accounts, opaque
//! bearer tokens and permission codes.

use std::{future::Future, sync::Arc};

use tokio_util::task::TaskTracker;
use tracing::{error, warn};

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{Metrics, RateLimiterRegistry};
pub use server::{create_router, with_middleware};

use services::{Email, IdentityStore, Mailer, SqlIdentityStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Token and permission lookups for the request pipeline
    pub identity_store: Arc<dyn IdentityStore>,
    pub rate_limiter: RateLimiterRegistry,
    pub metrics: Arc<Metrics>,
    /// `None` when no SMTP server is configured
    pub mailer: Option<Arc<Mailer>>,
    /// Tracks background work so shutdown can wait for it
    pub background: TaskTracker,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, mailer: Option<Mailer>) -> anyhow::Result<Self> {
        Ok(Self {
            identity_store: Arc::new(SqlIdentityStore::new(db.clone())),
            rate_limiter: RateLimiterRegistry::new(&config.limiter)?,
            metrics: Arc::new(Metrics::new()),
            mailer: mailer.map(Arc::new),
            background: TaskTracker::new(),
            config,
            db,
        })
    }

    /// Swap the identity store, e.g. for a counting or failing fake
    pub fn with_identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identity_store = store;
        self
    }

    /// Run `task` on the background tracker
    pub fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background.spawn(task);
    }

    /// Send `email` without holding up the response
    pub fn send_email_in_background(&self, recipient: String, email: Email) {
        let Some(mailer) = self.mailer.clone() else {
            warn!(recipient = %recipient, subject = %email.subject, "SMTP not configured, email dropped");
            return;
        };

        self.spawn_background(async move {
            if let Err(e) = mailer.send(&recipient, &email).await {
                error!(recipient = %recipient, error = %e, "Failed to send email");
            }
        });
    }
}
