//! HTTP routes for the CleanMate server

pub mod analyze;
pub mod audit;
pub mod chat;
pub mod events;
pub mod health;
pub mod session;
pub mod state;

pub use analyze::handle_analyze;
pub use audit::handle_audit;
pub use chat::handle_chat;
pub use events::handle_ingest;
pub use health::{ai_health, build_health_response, health_check, HealthResponse};
pub use session::{handle_create_session, handle_get_session, handle_set_step};
pub use state::handle_state;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, warn};

use crate::types::ServerError;

/// Serialize `body` as a JSON response with CORS headers.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, json) = match serde_json::to_vec(body) {
        Ok(json) => (status, json),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Serialization failed"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Error response, logged at a level matching its status.
pub fn error_response(err: ServerError) -> Response<Full<Bytes>> {
    let status = err.status();
    if status.is_server_error() {
        error!(status = status.as_u16(), retryable = err.is_retryable(), "Request failed: {}", err);
    } else {
        warn!(status = status.as_u16(), "Request rejected: {}", err);
    }
    json_response(status, &err.to_json())
}

/// Decode a JSON request body.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ServerError> {
    if body.is_empty() {
        return Err(ServerError::BadRequest("Request body is required".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Parse query string into key-value map
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
