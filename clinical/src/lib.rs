//! Clinical workflow core for CleanMate
//!
//! This crate holds the state machine behind the CleanMate assistant:
//!
//! - **State Store**: durable record of the last analysis, last optimization and history
//! - **Resolver**: derives the clinical mode from that record and the clock
//! - **Sessions**: per-conversation records that always reflect the current mode
//! - **Guardrail**: clamps model-proposed actions to what the mode permits
//! - **Prompt**: builds the system instruction and context message for the model
//!
//! The clinical mode is never stored. It is recomputed from the State Store on
//! every read, so a session can never report a mode the record does not back.
//!
//! # Example
//!
//! ```ignore
//! use clinical::{ClinicalConfig, PromptAssembler, SessionManager, StateStore};
//!
//! let store = Arc::new(StateStore::open("state/system_state.json"));
//! let sessions = SessionManager::new(store.clone(), &ClinicalConfig::default());
//!
//! let session = sessions.create_session().await;
//! let prompt = PromptAssembler::build_system_prompt(&session);
//! let outcome = clinical::guardrail::validate(&model_output, session.clinical_mode);
//! ```

pub mod config;
pub mod guardrail;
pub mod prompt;
pub mod resolver;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types
pub use config::ClinicalConfig;
pub use guardrail::{GuardrailOutcome, ModelReply, ParseError, FALLBACK_MESSAGE};
pub use prompt::PromptAssembler;
pub use resolver::{resolve, DEFAULT_THRESHOLD_HOURS};
pub use session::{SessionError, SessionManager, SessionStats};
pub use store::{StateStore, StoreError};
pub use types::*;
