//! Test application setup utilities
//!
//! Each [`TestApp`] owns a fresh temp-file SQLite database and the complete
//! middleware stack, driven in-process through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use rand::{distributions::Alphanumeric, Rng};
use tower::ServiceExt;

use super::mocks::CountingStore;

use greenlight::{
    config::{AppConfig, DatabaseConfig, LimiterConfig},
    create_router, db,
    services::IdentityStore,
    with_middleware, AppState,
};

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Test application with the rate limiter switched off
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let state = test_state(config).await;
        let router = create_router(state.clone());
        Self { router, state }
    }

    /// Test application whose identity store is wrapped by `wrap`
    pub async fn with_identity_store<F>(config: AppConfig, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn IdentityStore>) -> Arc<dyn IdentityStore>,
    {
        let state = test_state(config).await;
        let store = wrap(state.identity_store.clone());
        let state = state.with_identity_store(store);
        let router = create_router(state.clone());
        Self { router, state }
    }

    /// Test application whose token and permission lookups are counted
    pub async fn with_counting_store(config: AppConfig) -> (Self, Arc<CountingStore>) {
        let mut counter = None;
        let app = Self::with_identity_store(config, |inner| {
            let store = CountingStore::new(inner);
            counter = Some(store.clone());
            store as Arc<dyn IdentityStore>
        })
        .await;
        (app, counter.expect("store wrapped"))
    }

    /// Test application serving `extra` routes alongside the API
    pub async fn with_extra_routes<F>(config: AppConfig, extra: F) -> Self
    where
        F: FnOnce(&AppState) -> Router<AppState>,
    {
        let state = test_state(config).await;
        let routes = greenlight::api::routes(&state).merge(extra(&state));
        let router = with_middleware(routes, &state);
        Self { router, state }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body), None).await
    }

    pub async fn post_json_auth(&self, uri: &str, body: serde_json::Value, token: &str) -> TestResponse {
        self.send(Method::POST, uri, Some(body), Some(token)).await
    }

    pub async fn put_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body), None).await
    }

    pub async fn patch_json_auth(&self, uri: &str, body: serde_json::Value, token: &str) -> TestResponse {
        self.send(Method::PATCH, uri, Some(body), Some(token)).await
    }

    pub async fn delete_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None, Some(token)).await
    }

    /// Build and send a request, optionally with a JSON body and bearer token
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).unwrap()).await
    }

    /// Send a request with a raw `Authorization` header value
    pub async fn get_with_authorization(&self, uri: &str, authorization: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, authorization)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    /// Assert the `{"message": "..."}` body
    pub fn assert_message(&self, message: &str) -> &Self {
        assert_eq!(self.json()["message"], message, "Body: {}", self.text());
        self
    }

    /// Assert the `{"error": "..."}` message
    pub fn assert_error(&self, message: &str) -> &Self {
        assert_eq!(self.json()["error"], message, "Body: {}", self.text());
        self
    }
}

async fn test_state(config: AppConfig) -> AppState {
    let db = db::init_pool(&config.database)
        .await
        .expect("Failed to initialize test database");
    AppState::new(config, db, None).expect("Failed to build test state")
}

/// Configuration with a unique temp-file database and no rate limiting
pub fn test_config() -> AppConfig {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();

    AppConfig {
        database: DatabaseConfig {
            url: format!("sqlite:///tmp/greenlight_test_{}.db?mode=rwc", suffix),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        },
        limiter: LimiterConfig {
            enabled: false,
            ..LimiterConfig::default()
        },
        ..AppConfig::default()
    }
}

/// [`test_config`] with the limiter enabled at `rps` and `burst`
pub fn limited_config(rps: f64, burst: u32) -> AppConfig {
    let mut config = test_config();
    config.limiter = LimiterConfig {
        enabled: true,
        requests_per_second: rps,
        burst,
    };
    config
}
