//! Rate limiting middleware
//!
//! One token bucket per client identifier, created lazily at full burst.
//! The client map lives behind a single lock that is held only while a
//! bucket is created or consumed, and by the periodic eviction sweep.

use std::{collections::HashMap, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use anyhow::Context;
use governor::{
    clock::{Clock, DefaultClock, Reference},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use crate::{config::LimiterConfig, utils::AppError};

/// Clients idle for longer than this are dropped by the sweep
pub const STALE_AFTER: Duration = Duration::from_secs(3 * 60);

/// How often the sweep runs
pub const EVICTION_PERIOD: Duration = Duration::from_secs(60);

type ClientLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct Client<C: Clock> {
    limiter: ClientLimiter<C>,
    last_seen: C::Instant,
}

/// Per-client rate limiters with idle eviction
#[derive(Clone)]
pub struct RateLimiterRegistry<C: Clock = DefaultClock> {
    clients: Arc<Mutex<HashMap<String, Client<C>>>>,
    /// `None` when limiting is disabled
    quota: Option<Quota>,
    clock: C,
    stale_after: Duration,
}

fn quota_for(config: &LimiterConfig) -> anyhow::Result<Quota> {
    let burst = NonZeroU32::new(config.burst).context("limiter.burst must be greater than 0")?;
    let quota = config
        .replenish_period()
        .and_then(Quota::with_period)
        .with_context(|| {
            format!(
                "limiter.requests_per_second {} cannot be represented as a refill period",
                config.requests_per_second
            )
        })?;
    Ok(quota.allow_burst(burst))
}

impl RateLimiterRegistry<DefaultClock> {
    pub fn new(config: &LimiterConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock + Clone> RateLimiterRegistry<C> {
    /// Fails when limiting is enabled with a rate or burst governor cannot honour
    pub fn with_clock(config: &LimiterConfig, clock: C) -> anyhow::Result<Self> {
        let quota = if config.enabled { Some(quota_for(config)?) } else { None };
        Ok(Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            quota,
            clock,
            stale_after: STALE_AFTER,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.quota.is_some()
    }

    /// Consume one permit for `client_id`; always true when disabled
    pub async fn allow(&self, client_id: &str) -> bool {
        let Some(quota) = self.quota else {
            return true;
        };

        let now = self.clock.now();
        let mut clients = self.clients.lock().await;
        let client = clients
            .entry(client_id.to_string())
            .or_insert_with(|| Client {
                limiter: RateLimiter::direct_with_clock(quota, self.clock.clone()),
                last_seen: now,
            });
        client.last_seen = now;
        client.limiter.check().is_ok()
    }

    /// Drop every client idle for longer than the staleness window
    pub async fn evict_stale(&self) -> usize {
        let now = self.clock.now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, client| Duration::from(now.duration_since(client.last_seen)) <= self.stale_after);
        before - clients.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl<C> RateLimiterRegistry<C>
where
    C: Clock + Clone + Send + Sync + 'static,
    C::Instant: Send + Sync,
{
    /// Run [`evict_stale`](Self::evict_stale) every `period` until aborted
    pub fn spawn_eviction(&self, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = registry.evict_stale().await;
                if evicted > 0 {
                    debug!(evicted, "Rate limiter sweep");
                }
            }
        })
    }
}

/// Best-effort client identifier for a request
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware for Axum
pub async fn rate_limit_middleware(
    State(registry): State<RateLimiterRegistry>,
    request: Request,
    next: Next,
) -> Response {
    if !registry.is_enabled() {
        return next.run(request).await;
    }

    let client = client_ip(&request);
    if !registry.allow(&client).await {
        warn!(client = %client, "Rate limit exceeded");
        return AppError::RateLimited.into_response();
    }

    next.run(request).await
}
