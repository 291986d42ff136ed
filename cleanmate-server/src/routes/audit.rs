//! Guardrail audit trail
//!
//! `GET /api/audit?limit=N[&sessionId=ID]` returns the newest decisions
//! first, together with aggregate stats.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use cleanmate_agent::{AuditEntry, AuditStats};

use super::{error_response, json_response, parse_query_params};
use crate::server::AppState;
use crate::types::ServerError;

/// Entries returned when no limit is given
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub entries: Vec<AuditEntry>,
    pub stats: AuditStats,
}

pub async fn handle_audit(state: &AppState, query: Option<&str>) -> Response<Full<Bytes>> {
    let params = parse_query_params(query.unwrap_or(""));

    let limit = match params.get("limit") {
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) => limit,
            Err(_) => {
                return error_response(ServerError::BadRequest(format!(
                    "limit must be a non-negative integer, got {:?}",
                    raw
                )))
            }
        },
        None => DEFAULT_AUDIT_LIMIT,
    };

    let audit = state.service.audit();
    let entries = match params.get("sessionId").filter(|id| !id.is_empty()) {
        Some(session_id) => audit.get_by_session(session_id, limit).await,
        None => audit.recent(limit).await,
    };

    let response = AuditResponse {
        entries,
        stats: audit.stats().await,
    };
    json_response(StatusCode::OK, &response)
}
