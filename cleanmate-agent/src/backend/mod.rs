//! LLM Backend abstraction layer.
//!
//! Provides a trait-based interface over the external completion service:
//! - OpenAI-compatible (Groq, OpenAI, vLLM, Ollama)
//! - Mock backend for testing

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{
    CompletionRequest, CompletionResponse, LlmBackend, LlmError, Message, MessageRole, Usage,
};
