//! Health, liveness, and readiness endpoints.
//!
//! These sit outside the broker protocol: no version header is required.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// Detailed health as JSON. Always 200; the `state` field carries the verdict.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "services": state.registry.len(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: the process is up.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while `Ready`, 503 while starting or draining.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
