//! Health check endpoints
//!
//! `/` and `/health` are liveness probes: they answer 200 while the process
//! runs. `/api/ai-health` probes the completion backend.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use clinical::SessionStats;

use super::json_response;
use crate::server::AppState;

/// Liveness response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub timestamp: String,
    /// Whether chat turns can reach a completion backend
    pub backend_configured: bool,
    pub sessions: SessionStats,
}

pub fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: "online",
        service: "cleanmate-server",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        backend_configured: state.service.backend_id().is_some(),
        sessions: state.service.sessions().stats(),
    }
}

/// Handle liveness probe (`/`, `/health`)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &build_health_response(state))
}

/// Handle backend probe (`/api/ai-health`)
pub async fn ai_health(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.service.ai_health().await)
}
