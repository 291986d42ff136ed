//! Maintenance event ingestion
//!
//! `POST /api/events` (and `/api/report`) with
//! `{"type": "analyze" | "optimize", "report": {...}}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use cleanmate_agent::IngestRequest;

use super::{error_response, json_response, parse_body};
use crate::server::AppState;
use crate::types::ServerError;

pub async fn handle_ingest(state: &AppState, body: &Bytes) -> Response<Full<Bytes>> {
    let request: IngestRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.service.ingest(request).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(ServerError::from(e)),
    }
}
