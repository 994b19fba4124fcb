//! Middleware components
//!
//! This module contains middleware for:
//! - Panic recovery
//! - Request metrics
//! - Rate limiting
//! - Authentication (bearer tokens)
//! - Authorization (activation and permission checks)

pub mod auth;
pub mod authorization;
pub mod metrics;
pub mod rate_limit;
pub mod recover;

pub use auth::authenticate;
pub use metrics::{track_metrics, Metrics, MetricsSnapshot};
pub use rate_limit::{rate_limit_middleware, RateLimiterRegistry};
pub use recover::recover_layer;
