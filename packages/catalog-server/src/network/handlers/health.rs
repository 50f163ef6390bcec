//! Health, liveness, and readiness endpoint handlers.
//!
//! These handlers expose server health information for orchestrators
//! (Kubernetes, load balancers) and operational monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Returns detailed health information as JSON.
///
/// Always returns 200; the `state` field says whether the server is
/// actually serving. `dispatcher` reports whether a product dispatcher is
/// consuming from the bus, and `pending_replies` counts bus requests still
/// waiting on it.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();
    let dispatcher = state.gateway.has_dispatcher();
    let pending_replies = state.gateway.bus().pending_count();
    let in_flight = state.shutdown.in_flight_count();
    let uptime_secs = state.start_time.elapsed().as_secs();

    Json(json!({
        "state": health.as_str(),
        "dispatcher": dispatcher,
        "pending_replies": pending_replies,
        "in_flight": in_flight,
        "uptime_secs": uptime_secs,
    }))
}

/// Liveness probe; always 200 while the process answers at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only when the server is `Ready` and a dispatcher is
/// attached to the bus, 503 otherwise.
///
/// Without a dispatcher every product route would answer 401, so the
/// instance is kept out of rotation.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready && state.gateway.has_dispatcher() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
