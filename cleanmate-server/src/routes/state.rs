//! `GET /api/state`: the maintenance record and the mode it resolves to.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::json_response;
use crate::server::AppState;

pub async fn handle_state(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.service.snapshot().await)
}
