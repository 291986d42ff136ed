//! Session endpoints
//!
//! - `POST /api/session`: start a session
//! - `GET /api/session/{id}`: fetch with mode fields refreshed
//! - `POST /api/session/{id}/step`: move the guided flow to `{"step": n}`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{error_response, json_response, parse_body};
use crate::server::AppState;
use crate::types::ServerError;

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: u32,
}

pub async fn handle_create_session(state: &AppState) -> Response<Full<Bytes>> {
    let session = state.service.create_session().await;
    debug!(session_id = %session.id, "Session created");
    json_response(StatusCode::OK, &session)
}

pub async fn handle_get_session(state: &AppState, id: &str) -> Response<Full<Bytes>> {
    match state.service.get_session(id).await {
        Ok(session) => json_response(StatusCode::OK, &session),
        Err(e) => error_response(ServerError::from(e)),
    }
}

pub async fn handle_set_step(state: &AppState, id: &str, body: &Bytes) -> Response<Full<Bytes>> {
    let request: StepRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.service.set_step(id, request.step).await {
        Ok(session) => json_response(StatusCode::OK, &session),
        Err(e) => error_response(ServerError::from(e)),
    }
}
