//! Health check endpoint

use crate::error::ApiResponse;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Payload of GET /health
#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub module: String,
    pub version: String,
    pub mode: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub active_logins: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let now = Utc::now();
    ApiResponse::ok(
        HealthData {
            status: "healthy".to_string(),
            module: "sau-login".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: "login".to_string(),
            timestamp: now,
            uptime_seconds: (now - state.started_at).num_seconds(),
            active_logins: state.active_logins.len(),
        },
        "Service is running",
    )
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
