//! ClinicService - main entry point for conversational turns and event ingestion.
//!
//! A chat turn runs in three phases: snapshot (session + state, under the
//! store/session locks), model call (no locks held, bounded by a timeout),
//! then guardrail + audit on the snapshot taken in phase one. A failed call
//! writes nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use clinical::{
    guardrail, resolve, PromptAssembler, Session, SessionError, SessionManager, StateStore,
    StoreError,
};

use crate::analysis::{build_analysis_message, ANALYSIS_MAX_TOKENS, ANALYSIS_SYSTEM_PROMPT};
use crate::audit::{prompt_hash, AuditEntry, AuditLog, DEFAULT_MAX_AUDIT_ENTRIES};
use crate::backend::{CompletionRequest, CompletionResponse, LlmBackend, LlmError, Message};
use crate::request::{AnalyzeRequest, ChatRequest, IngestRequest};
use crate::response::{AiHealth, AnalysisResponse, ChatResponse, IngestResponse, StateSnapshot};
use crate::transcript::{TranscriptStore, DEFAULT_TRANSCRIPT_TURNS};

/// Error types for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request validation error
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown or expired session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No completion backend was configured at startup
    #[error("No LLM backend configured")]
    NoBackendConfigured,

    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    /// State could not be written
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl ServiceError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => Self::SessionNotFound(id),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

/// Configuration for the ClinicService.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum tokens per model reply
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on a single model call
    pub timeout: Duration,
    /// Prior turns sent with each request
    pub transcript_turns: usize,
    /// Guardrail decisions kept in the audit log
    pub audit_max_entries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.3,
            timeout: Duration::from_secs(10),
            transcript_turns: DEFAULT_TRANSCRIPT_TURNS,
            audit_max_entries: DEFAULT_MAX_AUDIT_ENTRIES,
        }
    }
}

/// Orchestrates sessions, prompts, the completion backend and the guardrail.
pub struct ClinicService {
    /// Configuration
    config: ServiceConfig,
    /// Maintenance record
    store: Arc<StateStore>,
    /// Conversation sessions
    sessions: Arc<SessionManager>,
    /// Completion backend, if one is configured
    backend: Option<Arc<dyn LlmBackend>>,
    /// Recent turns per session
    transcripts: TranscriptStore,
    /// Guardrail decisions
    audit: AuditLog,
}

impl ClinicService {
    /// Create a new service over the given components.
    pub fn new(
        store: Arc<StateStore>,
        sessions: Arc<SessionManager>,
        backend: Option<Arc<dyn LlmBackend>>,
    ) -> Self {
        Self::with_config(store, sessions, backend, ServiceConfig::default())
    }

    /// Create with configuration.
    pub fn with_config(
        store: Arc<StateStore>,
        sessions: Arc<SessionManager>,
        backend: Option<Arc<dyn LlmBackend>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            transcripts: TranscriptStore::new(config.transcript_turns),
            audit: AuditLog::with_max_entries(config.audit_max_entries),
            config,
            store,
            sessions,
            backend,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Identifier of the configured backend.
    pub fn backend_id(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.id())
    }

    /// Record an analysis or optimization reported by the cleanup utility.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse, ServiceError> {
        let (kind, event) = request.into_event().map_err(ServiceError::InvalidRequest)?;
        let state = self.store.record_event(kind, event).await?;
        let clinical_mode = resolve(&state, Utc::now(), self.sessions.threshold_hours());

        info!(kind = %kind, clinical_mode = %clinical_mode, "Maintenance event ingested");

        Ok(IngestResponse {
            status: "ok".to_string(),
            clinical_mode,
            history_len: state.history.len(),
        })
    }

    /// Run one conversational turn.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ServiceError> {
        request.validate().map_err(ServiceError::InvalidRequest)?;
        let backend = self
            .backend
            .clone()
            .ok_or(ServiceError::NoBackendConfigured)?;

        // Snapshot. The guardrail validates against this mode even if the
        // state changes while the model is thinking.
        let session = self.sessions.touch_session(request.session_id.as_deref()).await;
        let state = self.store.load().await;

        let system_prompt = PromptAssembler::build_system_prompt(&session);
        let hash = prompt_hash(&system_prompt);
        let user_message = request.user_message.trim();
        let context_message =
            PromptAssembler::build_context_message(&state, request.metrics(), user_message);

        let completion_request = CompletionRequest::default()
            .with_system(system_prompt)
            .with_messages(self.transcripts.history(&session.id))
            .with_message(Message::user(context_message))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output();

        debug!(
            session_id = %session.id,
            clinical_mode = %session.clinical_mode,
            backend = backend.id(),
            "Calling completion backend"
        );

        let start = Instant::now();
        let completion = self
            .call_backend(backend.as_ref(), completion_request)
            .await
            .inspect_err(|e| {
                warn!(
                    session_id = %session.id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Completion failed"
                )
            })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = guardrail::validate(&completion.content, session.clinical_mode);

        if outcome.parse_failed || outcome.downgraded {
            warn!(
                session_id = %session.id,
                clinical_mode = %session.clinical_mode,
                raw_type = outcome.raw_type.as_deref().unwrap_or("-"),
                validated_type = %outcome.action.action_type,
                parse_failed = outcome.parse_failed,
                downgraded = outcome.downgraded,
                prompt_hash = %hash,
                "guardrail decision"
            );
        } else {
            info!(
                session_id = %session.id,
                clinical_mode = %session.clinical_mode,
                raw_type = outcome.raw_type.as_deref().unwrap_or("-"),
                validated_type = %outcome.action.action_type,
                parse_failed = outcome.parse_failed,
                downgraded = outcome.downgraded,
                prompt_hash = %hash,
                "guardrail decision"
            );
        }

        let entry = AuditEntry::from_outcome(&session.id, session.clinical_mode, &outcome)
            .with_call(backend.id(), hash, completion.usage, duration_ms);
        self.audit.record(entry).await;

        self.transcripts
            .record_turn(&session.id, user_message, &outcome.user_message);

        Ok(ChatResponse {
            message: outcome.user_message,
            next_action: outcome.action,
            mode: session.mode,
            session_state: session,
        })
    }

    /// Short free-text advice on the reported host load.
    ///
    /// Runs outside any session: nothing is audited or persisted.
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResponse, ServiceError> {
        request.validate().map_err(ServiceError::InvalidRequest)?;
        let backend = self
            .backend
            .clone()
            .ok_or(ServiceError::NoBackendConfigured)?;

        let completion_request = CompletionRequest::default()
            .with_system(ANALYSIS_SYSTEM_PROMPT)
            .with_message(Message::user(build_analysis_message(&request)))
            .with_max_tokens(ANALYSIS_MAX_TOKENS)
            .with_temperature(self.config.temperature);

        let start = Instant::now();
        let completion = self
            .call_backend(backend.as_ref(), completion_request)
            .await
            .inspect_err(|e| warn!(error = %e, "System analysis failed"))?;

        info!(
            backend = backend.id(),
            duration_ms = start.elapsed().as_millis() as u64,
            tokens = completion.usage.total(),
            "System analysis completed"
        );

        Ok(AnalysisResponse::from_completion(backend.id(), completion))
    }

    /// One backend call bounded by the configured timeout.
    async fn call_backend(
        &self,
        backend: &dyn LlmBackend,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        match tokio::time::timeout(self.config.timeout, backend.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }),
        }
    }

    /// Start a new session.
    pub async fn create_session(&self) -> Session {
        self.sessions.create_session().await
    }

    /// Look up a session with its mode fields refreshed.
    pub async fn get_session(&self, id: &str) -> Result<Session, ServiceError> {
        self.sessions
            .get_session(id)
            .await
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    /// Move a session to another guided-flow step.
    pub async fn set_step(&self, id: &str, step: u32) -> Result<Session, ServiceError> {
        Ok(self.sessions.set_step(id, step).await?)
    }

    /// Current state with the mode it resolves to.
    pub async fn snapshot(&self) -> StateSnapshot {
        let state = self.store.load().await;
        let threshold_hours = self.sessions.threshold_hours();
        StateSnapshot {
            clinical_mode: resolve(&state, Utc::now(), threshold_hours),
            threshold_hours,
            state,
        }
    }

    /// Report whether a completion backend is configured and reachable.
    pub async fn ai_health(&self) -> AiHealth {
        let (model, reachable) = match &self.backend {
            Some(backend) => (Some(backend.id().to_string()), backend.is_available().await),
            None => (None, false),
        };
        AiHealth {
            status: "ok".to_string(),
            configured: self.backend.is_some(),
            model,
            reachable,
        }
    }

    /// Evict expired sessions and their transcripts.
    pub fn cleanup(&self) -> usize {
        let removed = self.sessions.cleanup();
        let dropped = self.transcripts.retain(|id| self.sessions.contains(id));
        if dropped > 0 {
            debug!("Dropped {} orphaned transcripts", dropped);
        }
        removed
    }

    /// Spawn a background task to periodically evict expired sessions
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = service.cleanup();
                if removed > 0 {
                    debug!("Session cleanup: removed {} expired sessions", removed);
                }
            }
        });
        info!("Session cleanup task started");
    }
}
