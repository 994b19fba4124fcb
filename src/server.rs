//! Router assembly
//!
//! Cross-cutting layers wrap the route tree in a fixed order, outermost first:
//! panic recovery, request tracing, metrics, CORS, rate limiting,
//! authentication. Per-route authorization sits on the routes themselves.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::{
    api,
    config::CorsConfig,
    middleware::{authenticate, rate_limit_middleware, recover_layer, track_metrics},
    utils::json::MAX_BODY_BYTES,
    AppState,
};

/// Build the CORS layer for the trusted origin list
///
/// Origins are matched exactly; an empty list means no cross-origin access.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid trusted origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::OPTIONS, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Wrap `router` in the request pipeline and bind `state`
pub fn with_middleware(router: Router<AppState>, state: &AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors_layer(&state.config.cors))
        .layer(from_fn_with_state(state.metrics.clone(), track_metrics))
        .layer(trace_layer)
        .layer(recover_layer())
        .with_state(state.clone())
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    with_middleware(api::routes(&state), &state)
}
