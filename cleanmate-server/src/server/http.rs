//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Request bodies are
//! collected up front so routing works on plain bytes.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use cleanmate_agent::ClinicService;

use crate::config::Args;
use crate::routes::{self, json_response};
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Chat turns, ingestion, sessions and audit
    pub service: Arc<ClinicService>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, service: Arc<ClinicService>) -> Self {
        Self {
            args,
            service,
            started_at: Instant::now(),
        }
    }
}

/// Bind the configured address and serve until the process exits.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("CleanMate server listening on {}", state.args.listen);

    if state.service.backend_id().is_none() {
        warn!("No completion backend configured - /api/chat and /api/analyze will answer 503");
    }

    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    debug!("[{}] {} {}", addr, method, path);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("[{}] Failed to read request body: {}", addr, e);
            return Ok(to_boxed(bad_request_response("Failed to read request body")));
        }
    };

    let response = route(&state, &method, &path, query.as_deref(), body).await;
    debug!("[{}] {} {} -> {}", addr, method, path, response.status());

    Ok(to_boxed(response))
}

/// Dispatch a request to its handler.
pub async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match (method, path) {
        // CORS preflight
        (&Method::OPTIONS, _) => preflight_response(),

        // Liveness
        (&Method::GET, "/") | (&Method::GET, "/health") => routes::health_check(state),

        (&Method::GET, "/api/ai-health") => routes::ai_health(state).await,

        // Maintenance events from the cleanup utility (`/api/report` for older clients)
        (&Method::POST, "/api/events") | (&Method::POST, "/api/report") => {
            routes::handle_ingest(state, &body).await
        }

        (&Method::POST, "/api/chat") => routes::handle_chat(state, &body).await,

        (&Method::POST, "/api/analyze") => routes::handle_analyze(state, &body).await,

        (&Method::POST, "/api/session") => routes::handle_create_session(state).await,

        (&Method::GET, "/api/state") => routes::handle_state(state).await,

        (&Method::GET, "/api/audit") => routes::handle_audit(state, query).await,

        // Session lookup and step changes: /api/session/{id}[/step]
        (_, p) if p.starts_with("/api/session/") => {
            let rest = &p["/api/session/".len()..];
            match (method, rest.strip_suffix("/step")) {
                (&Method::POST, Some(id)) if is_session_id(id) => {
                    routes::handle_set_step(state, id, &body).await
                }
                (&Method::GET, None) if is_session_id(rest) => {
                    routes::handle_get_session(state, rest).await
                }
                _ => not_found_response(path),
            }
        }

        _ => not_found_response(path),
    }
}

fn is_session_id(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/')
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    use hyper::header::{
        HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN,
    };

    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path,
        }),
    )
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({
            "error": "Bad Request",
            "message": message,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use cleanmate_agent::{LlmBackend, MockBackend, ServiceConfig};
    use clinical::{ClinicalConfig, SessionManager, StateStore};
    use serde_json::{json, Value};

    fn state_with(backend: Option<Arc<dyn LlmBackend>>) -> AppState {
        let args = Args::parse_from(["cleanmate-server"]);
        let store = Arc::new(StateStore::memory_only());
        let sessions = Arc::new(SessionManager::new(store.clone(), &ClinicalConfig::default()));
        let service =
            ClinicService::with_config(store, sessions, backend, ServiceConfig::default());
        AppState::new(args, Arc::new(service))
    }

    async fn call(
        state: &AppState,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let bytes = if body.is_null() {
            Bytes::new()
        } else {
            Bytes::from(body.to_string())
        };
        let response = route(state, &method, path, query, bytes).await;
        let status = response.status();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        let json = if collected.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&collected).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_preflight() {
        let state = state_with(None);

        let (status, body) = call(&state, Method::GET, "/health", None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let (status, _) = call(&state, Method::OPTIONS, "/api/chat", None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let state = state_with(None);
        let (status, body) = call(&state, Method::GET, "/api/nothing", None, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["path"], "/api/nothing");

        let (status, _) = call(&state, Method::DELETE, "/api/session/abc", None, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ingest_then_state() {
        let state = state_with(None);

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/events",
            None,
            json!({"type": "analyze", "report": {"fileCount": 12}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clinicalMode"], "needs_optimization");
        assert_eq!(body["historyLen"], 1);

        let (status, body) = call(&state, Method::GET, "/api/state", None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clinicalMode"], "needs_optimization");
        assert_eq!(body["state"]["last_analysis"]["summary"]["fileCount"], 12);
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_input() {
        let state = state_with(None);

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/report",
            None,
            json!({"type": "defrag", "report": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, Method::POST, "/api/events", None, Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&state, Method::GET, "/api/state", None, Value::Null).await;
        assert_eq!(body["clinicalMode"], "needs_analysis");
        assert_eq!(body["state"]["history"], json!([]));
    }

    #[tokio::test]
    async fn test_chat_without_backend() {
        let state = state_with(None);
        let (status, body) = call(
            &state,
            Method::POST,
            "/api/chat",
            None,
            json!({"userMessage": "hola"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_chat_clamps_action() {
        let backend = MockBackend::new("mock-model").with_response(
            json!({
                "message": "Optimicemos ya.",
                "nextAction": {"type": "optimize", "label": "Optimizar", "autoExecute": true}
            })
            .to_string(),
        );
        let state = state_with(Some(Arc::new(backend)));

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/chat",
            None,
            json!({"userMessage": "limpia mi equipo"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Optimicemos ya.");
        assert_eq!(body["nextAction"]["type"], "none");
        assert_eq!(body["nextAction"]["autoExecute"], false);
        assert_eq!(body["mode"], "guided_flow");
        assert_eq!(body["sessionState"]["clinicalMode"], "needs_analysis");

        let (status, audit) =
            call(&state, Method::GET, "/api/audit", Some("limit=5"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(audit["stats"]["downgrades"], 1);
        assert_eq!(audit["entries"][0]["rawType"], "optimize");
    }

    #[tokio::test]
    async fn test_retryable_backend_failure() {
        let backend = MockBackend::new("mock-model");
        backend.push_error(cleanmate_agent::LlmError::Timeout { timeout_ms: 10_000 });
        let state = state_with(Some(Arc::new(backend)));

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/chat",
            None,
            json!({"userMessage": "hola"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_analyze_returns_completion_envelope() {
        let backend =
            MockBackend::new("mock-model").with_response("Cierra programas en segundo plano.");
        let state = state_with(Some(Arc::new(backend)));

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/analyze",
            None,
            json!({"system_info": {"cpu": 88, "ram_percent": 92, "disk_percent": 40}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["choices"][0]["message"]["content"],
            "Cierra programas en segundo plano."
        );
        assert_eq!(body["model"], "mock-model");
    }

    #[tokio::test]
    async fn test_analyze_errors() {
        let backend = MockBackend::new("mock-model");
        backend.push_error(cleanmate_agent::LlmError::Timeout { timeout_ms: 10_000 });
        backend.push_error(cleanmate_agent::LlmError::Unauthorized { status: 401 });
        let backend = Arc::new(backend);
        let state = state_with(Some(backend.clone() as Arc<dyn LlmBackend>));

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/analyze",
            None,
            json!({"cleanup_info": {"last_cleanup": "ayer"}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(backend.call_count(), 0);

        let analyze = json!({"system_info": {}});
        let (status, body) =
            call(&state, Method::POST, "/api/analyze", None, analyze.clone()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["retryable"], true);

        let (status, body) = call(&state, Method::POST, "/api/analyze", None, analyze).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["retryable"], false);

        let state = state_with(None);
        let (status, _) = call(
            &state,
            Method::POST,
            "/api/analyze",
            None,
            json!({"system_info": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = state_with(None);

        let (status, created) = call(&state, Method::POST, "/api/session", None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) =
            call(&state, Method::GET, &format!("/api/session/{}", id), None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["clinicalMode"], "needs_analysis");

        let (status, stepped) = call(
            &state,
            Method::POST,
            &format!("/api/session/{}/step", id),
            None,
            json!({"step": 3}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stepped["step"], 3);

        let (status, _) = call(
            &state,
            Method::POST,
            &format!("/api/session/{}/step", id),
            None,
            json!({"step": 0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            call(&state, Method::GET, "/api/session/missing", None, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
