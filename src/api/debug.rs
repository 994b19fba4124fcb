//! Runtime counters

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::{db, AppState};

pub async fn debug_vars(State(state): State<AppState>) -> Json<Value> {
    let status = match db::check_health(&state.db).await {
        Ok(()) => "available",
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "unavailable"
        }
    };

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().timestamp(),
        "database": {
            "status": status,
            "connections": state.db.size(),
            "idle": state.db.num_idle(),
            "max_connections": state.config.database.max_connections,
        },
        "rate_limiter": {
            "enabled": state.rate_limiter.is_enabled(),
            "tracked_clients": state.rate_limiter.tracked_clients().await,
        },
        "requests": state.metrics.snapshot(),
    }))
}
