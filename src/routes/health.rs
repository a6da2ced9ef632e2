/**
 * Health Routes
 * Liveness plus a store round-trip check
 */
use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::response::ok;
use crate::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Store check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheck {
    pub backend: String,
    pub status: String,
    pub response_time_ms: Option<u64>,
}

/// GET /api/health response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub store: StoreCheck,
}

/// GET /api/health
/// Always 200 while the process is up; the store check reports separately.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.store.ping().await {
        Ok(duration) => StoreCheck {
            backend: state.store.backend().to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(duration.as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            StoreCheck {
                backend: state.store.backend().to_string(),
                status: "unhealthy".to_string(),
                response_time_ms: None,
            }
        }
    };

    ok(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        store,
    })
}
