//! Conversational turn
//!
//! `POST /api/chat` with `{"sessionId"?, "userMessage", "context"?}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use cleanmate_agent::ChatRequest;

use super::{error_response, json_response, parse_body};
use crate::server::AppState;
use crate::types::ServerError;

pub async fn handle_chat(state: &AppState, body: &Bytes) -> Response<Full<Bytes>> {
    let request: ChatRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.service.chat(request).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(ServerError::from(e)),
    }
}
