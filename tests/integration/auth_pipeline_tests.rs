//! Request pipeline tests
//!
//! Exercise authentication, authorization, rate limiting, CORS and panic
//! recovery through the fully layered router.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::get,
    Router,
};
use rstest::rstest;
use serde_json::json;

use greenlight::{
    middleware::authorization::{activated_user_middleware, authenticated_user_middleware},
    models::{Identity, MOVIES_READ, MOVIES_WRITE},
    AppState,
};

use crate::common::{
    expired_token, limited_config, seed_catalog, test_config, TestApp, UserFactory,
};

const NOT_AUTHENTICATED: &str = "you must be authenticated to access this resource";
const NOT_ACTIVATED: &str = "your user account must be activated to access this resource";
const NOT_PERMITTED: &str =
    "your user account doesn't have the necessary permissions to access this resource";
const BAD_TOKEN: &str = "invalid or missing authentication token";

#[tokio::test]
async fn test_anonymous_request_is_rejected_without_permission_lookup() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;

    let response = app.get("/v1/movies").await;

    response.assert_unauthorized().assert_error(NOT_AUTHENTICATED);
    assert!(response.header("www-authenticate").is_none());
    assert_eq!(store.token_lookups(), 0);
    assert_eq!(store.permission_lookups(), 0);
}

#[tokio::test]
async fn test_unactivated_user_is_rejected_before_permission_lookup() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;
    let (_, token) = UserFactory::new(&app.state)
        .permission(MOVIES_READ)
        .with_token()
        .await;

    let response = app.get_auth("/v1/movies", &token).await;

    response.assert_forbidden().assert_error(NOT_ACTIVATED);
    assert_eq!(store.token_lookups(), 1);
    assert_eq!(store.permission_lookups(), 0);
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;
    let (_, token) = UserFactory::new(&app.state)
        .activated()
        .permission(MOVIES_READ)
        .with_token()
        .await;

    let response = app
        .post_json_auth(
            "/v1/movies",
            json!({"title": "Moana", "year": 2016, "runtime": "107 mins", "genres": ["animation"]}),
            &token,
        )
        .await;

    response.assert_forbidden().assert_error(NOT_PERMITTED);
    assert_eq!(store.permission_lookups(), 1);
}

#[tokio::test]
async fn test_permitted_user_reaches_handler() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;
    seed_catalog(&app.state).await;
    let (_, token) = UserFactory::new(&app.state)
        .activated()
        .permission(MOVIES_READ)
        .with_token()
        .await;

    let response = app.get_auth("/v1/movies", &token).await;

    response.assert_ok();
    assert_eq!(response.json()["movies"].as_array().unwrap().len(), 5);
    assert_eq!(store.permission_lookups(), 1);
}

#[tokio::test]
async fn test_write_permission_does_not_imply_read() {
    let app = TestApp::new().await;
    let (_, token) = UserFactory::new(&app.state)
        .activated()
        .permission(MOVIES_WRITE)
        .with_token()
        .await;

    app.get_auth("/v1/movies/1", &token)
        .await
        .assert_forbidden()
        .assert_error(NOT_PERMITTED);
}

#[rstest]
#[case::wrong_scheme("Token Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")]
#[case::lowercase_scheme("bearer Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")]
#[case::scheme_only("Bearer")]
#[case::extra_part("Bearer Y3QMGX3PJ3WLRL2YRTQGQ6KRHU extra")]
#[case::double_space("Bearer  Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")]
#[case::short_token("Bearer abc")]
#[tokio::test]
async fn test_malformed_authorization_header(#[case] authorization: &str) {
    let (app, store) = TestApp::with_counting_store(test_config()).await;

    let response = app.get_with_authorization("/v1/healthcheck", authorization).await;

    response.assert_unauthorized().assert_error(BAD_TOKEN);
    assert_eq!(response.header("www-authenticate"), Some("Bearer"));
    assert_eq!(store.token_lookups(), 0);
}

#[tokio::test]
async fn test_empty_authorization_header_is_anonymous() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;

    let response = app.get_with_authorization("/v1/healthcheck", "").await;

    response.assert_ok();
    assert!(response.header("www-authenticate").is_none());
    assert_eq!(store.token_lookups(), 0);

    app.get_with_authorization("/v1/movies", "")
        .await
        .assert_unauthorized()
        .assert_error(NOT_AUTHENTICATED);
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;

    let response = app
        .get_auth("/v1/healthcheck", "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
        .await;

    response.assert_unauthorized().assert_error(BAD_TOKEN);
    assert_eq!(response.header("www-authenticate"), Some("Bearer"));
    assert_eq!(store.token_lookups(), 1);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new().await;
    let user = UserFactory::new(&app.state)
        .activated()
        .permission(MOVIES_READ)
        .create()
        .await;
    let token = expired_token(&app.state, user.id).await;

    app.get_auth("/v1/movies", &token)
        .await
        .assert_unauthorized()
        .assert_error(BAD_TOKEN);
}

#[tokio::test]
async fn test_token_store_failure_is_server_error() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;
    store.fail_lookups();

    let response = app
        .get_auth("/v1/healthcheck", "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
        .await;

    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_error("the server encountered a problem and could not process your request");
}

#[tokio::test]
async fn test_permission_store_failure_is_server_error() {
    let (app, store) = TestApp::with_counting_store(test_config()).await;
    let (_, token) = UserFactory::new(&app.state)
        .activated()
        .permission(MOVIES_READ)
        .with_token()
        .await;
    store.fail_permission_lookups();

    let response = app.get_auth("/v1/movies", &token).await;

    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_error("the server encountered a problem and could not process your request");
    assert_eq!(store.token_lookups(), 1);
    assert_eq!(store.permission_lookups(), 1);
}

#[tokio::test]
async fn test_vary_authorization_on_every_response() {
    let app = TestApp::new().await;

    let ok = app.get("/v1/healthcheck").await;
    ok.assert_ok();
    assert_eq!(ok.header("vary"), Some("Authorization"));

    let rejected = app.get_with_authorization("/v1/healthcheck", "Basic abc").await;
    rejected.assert_unauthorized();
    assert_eq!(rejected.header("vary"), Some("Authorization"));
}

#[tokio::test]
async fn test_rate_limit_exhausts_burst() {
    let app = TestApp::with_config(limited_config(2.0, 4)).await;

    for _ in 0..4 {
        app.get("/v1/healthcheck").await.assert_ok();
    }

    let response = app.get("/v1/healthcheck").await;
    response
        .assert_status(StatusCode::TOO_MANY_REQUESTS)
        .assert_error("rate limit exceeded");
    assert_eq!(response.header("retry-after"), Some("1"));
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = TestApp::with_config(limited_config(1.0, 1)).await;

    let from = |ip: &str| {
        Request::builder()
            .uri("/v1/healthcheck")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    app.request(from("203.0.113.1")).await.assert_ok();
    app.request(from("203.0.113.1"))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    app.request(from("203.0.113.2")).await.assert_ok();
    assert_eq!(app.state.rate_limiter.tracked_clients().await, 2);
}

#[tokio::test]
async fn test_rate_limit_runs_before_authentication() {
    let (app, store) = TestApp::with_counting_store(limited_config(2.0, 2)).await;

    for _ in 0..2 {
        app.get_auth("/v1/healthcheck", "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
            .await
            .assert_unauthorized();
    }
    app.get_auth("/v1/healthcheck", "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(store.token_lookups(), 2);
}

async fn boom() -> &'static str {
    panic!("handler exploded")
}

fn panic_routes(_state: &AppState) -> Router<AppState> {
    Router::new().route("/v1/boom", get(boom))
}

#[tokio::test]
async fn test_panic_is_recovered() {
    let app = TestApp::with_extra_routes(test_config(), panic_routes).await;

    let response = app.get("/v1/boom").await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_error("the server encountered a problem and could not process your request");
    assert_eq!(response.header("connection"), Some("close"));

    // the server keeps serving after a panic
    app.get("/v1/healthcheck").await.assert_ok();
    assert_eq!(app.state.metrics.snapshot().active_requests, 0);
}

async fn whoami(identity: Identity) -> String {
    identity.email().unwrap_or("anonymous").to_string()
}

fn gated_routes(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/me",
            get(whoami).route_layer(axum::middleware::from_fn(authenticated_user_middleware)),
        )
        .route(
            "/v1/me/active",
            get(whoami).route_layer(axum::middleware::from_fn(activated_user_middleware)),
        )
        .route("/v1/whoami", get(whoami))
}

#[tokio::test]
async fn test_authenticated_and_activated_only_layers() {
    let app = TestApp::with_extra_routes(test_config(), gated_routes).await;
    let (_, pending) = UserFactory::new(&app.state)
        .email("pending@example.com")
        .with_token()
        .await;

    app.get("/v1/me").await.assert_unauthorized().assert_error(NOT_AUTHENTICATED);
    app.get("/v1/whoami").await.assert_ok();
    assert_eq!(app.get("/v1/whoami").await.text(), "anonymous");

    let response = app.get_auth("/v1/me", &pending).await;
    response.assert_ok();
    assert_eq!(response.text(), "pending@example.com");

    app.get_auth("/v1/me/active", &pending)
        .await
        .assert_forbidden()
        .assert_error(NOT_ACTIVATED);

    let (_, active) = UserFactory::new(&app.state).activated().with_token().await;
    app.get_auth("/v1/me/active", &active).await.assert_ok();
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new().await;
    app.get("/v1/nope")
        .await
        .assert_not_found()
        .assert_error("the requested resource could not be found");
}

#[tokio::test]
async fn test_wrong_method_is_json_405() {
    let app = TestApp::new().await;
    app.send(Method::DELETE, "/v1/healthcheck", None, None)
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_error("the DELETE method is not supported for this resource");
}

#[tokio::test]
async fn test_cors_preflight_for_trusted_origin() {
    let mut config = test_config();
    config.cors.trusted_origins = vec!["http://localhost:9000".to_string()];
    let app = TestApp::with_config(config).await;

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/movies")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap()
    };

    let trusted = app.request(preflight("http://localhost:9000")).await;
    trusted.assert_ok();
    assert_eq!(
        trusted.header("access-control-allow-origin"),
        Some("http://localhost:9000")
    );

    let untrusted = app.request(preflight("http://evil.example")).await;
    assert!(untrusted.header("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_cors_preflight_bypasses_exhausted_rate_limit() {
    let mut config = limited_config(1.0, 1);
    config.cors.trusted_origins = vec!["http://localhost:9000".to_string()];
    let app = TestApp::with_config(config).await;

    app.get("/v1/healthcheck").await.assert_ok();
    app.get("/v1/healthcheck")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/movies")
        .header(header::ORIGIN, "http://localhost:9000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())
        .unwrap();
    let response = app.request(preflight).await;

    response.assert_ok();
    assert_eq!(
        response.header("access-control-allow-origin"),
        Some("http://localhost:9000")
    );
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let app = TestApp::new().await;
    app.get("/v1/healthcheck").await.assert_ok();
    app.get("/v1/nope").await.assert_not_found();

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.total_requests_received, 2);
    assert_eq!(snapshot.total_responses_sent, 2);
    assert_eq!(snapshot.active_requests, 0);
    assert_eq!(snapshot.total_responses_sent_by_status.get(&404), Some(&1));
}
