//! Health Routes
//!
//! - GET /health - Liveness probe, fixed `ok` body
//! - GET /stats - Hub counters and uptime

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::StatsResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /health
///
/// Liveness probe. Never touches the hub.
pub async fn health() -> &'static str {
    "ok"
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsResponse>> {
    let hub = state.hub.stats().await?;

    Ok(Json(StatsResponse {
        mode: state.hub.mode().as_str().to_string(),
        hub,
        server_ip: state.server_ip.clone(),
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
