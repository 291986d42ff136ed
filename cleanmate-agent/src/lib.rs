//! CleanMate Agent - conversational clinic service
//!
//! Provides the pieces between an HTTP request and the clinical core:
//! - Trait-based LLM backends (OpenAI-compatible, mock)
//! - Per-session transcripts
//! - An audit trail of every guardrail decision
//! - [`ClinicService`], which runs chat turns, quick analyses and event ingestion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             ClinicService               │
//! │  (chat turns, ingestion, audit)         │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ LlmBackend  │       │  clinical   │
//! │ (OpenAI/    │       │ (sessions,  │
//! │  mock)      │       │  guardrail) │
//! └─────────────┘       └─────────────┘
//! ```

pub mod analysis;
pub mod audit;
pub mod backend;
pub mod request;
pub mod response;
pub mod service;
pub mod transcript;

// Re-export main types for convenience
pub use audit::{AuditEntry, AuditLog, AuditStats};
pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use backend::{MockBackend, OpenAiBackend};
pub use request::{
    AnalyzeRequest, ChatContext, ChatRequest, CleanupInfo, IngestRequest, SystemInfo,
};
pub use response::{AiHealth, AnalysisResponse, ChatResponse, IngestResponse, StateSnapshot};
pub use service::{ClinicService, ServiceConfig, ServiceError};
pub use transcript::TranscriptStore;
