//! Quick system analysis
//!
//! `POST /api/analyze` with `{"system_info": {...}, "cleanup_info"?: {...}}`.
//! Any model failure answers 502 here, retryable or not; the body's
//! `retryable` flag still tells the client whether to try again.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use cleanmate_agent::{AnalyzeRequest, ServiceError};

use super::{error_response, json_response, parse_body};
use crate::server::AppState;
use crate::types::ServerError;

pub async fn handle_analyze(state: &AppState, body: &Bytes) -> Response<Full<Bytes>> {
    let request: AnalyzeRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.service.analyze(request).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(ServiceError::Backend(e)) => error_response(ServerError::Upstream(e)),
        Err(e) => error_response(ServerError::from(e)),
    }
}
