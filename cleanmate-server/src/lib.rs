//! CleanMate server - HTTP surface for the clinic assistant
//!
//! Exposes [`cleanmate_agent::ClinicService`] over plain HTTP/1 with JSON
//! bodies and permissive CORS for the desktop frontend.
//!
//! ## Endpoints
//!
//! - `GET /`, `/health`: liveness
//! - `GET /api/ai-health`: completion backend reachability
//! - `POST /api/events` (`/api/report`): maintenance event ingestion
//! - `POST /api/chat`: conversational turn
//! - `POST /api/analyze`: quick system analysis
//! - `POST /api/session`, `GET /api/session/{id}`, `POST /api/session/{id}/step`
//! - `GET /api/state`: maintenance record and clinical mode
//! - `GET /api/audit`: guardrail decisions

pub mod config;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{Result, ServerError};
