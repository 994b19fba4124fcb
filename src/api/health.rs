//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub system_info: SystemInfo,
}

#[derive(Serialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: String,
}

/// Returns 200 while the process is serving; does not check dependencies
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.config.server.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    })
}
