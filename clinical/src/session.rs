//! Session Management
//!
//! Tracks per-conversation sessions. Every read re-resolves the clinical mode
//! from the State Store, so a returned session is never staler than a single
//! store read. Idle sessions expire after a TTL.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ClinicalConfig;
use crate::resolver::resolve;
use crate::store::StateStore;
use crate::types::{ClinicalMode, Session};

/// Error types for session updates.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown or expired session
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Steps are 1-based
    #[error("Invalid step {0}: steps start at 1")]
    InvalidStep(u32),
}

/// In-memory session store with idle expiration.
pub struct SessionManager {
    /// Source of the clinical mode
    store: Arc<StateStore>,
    /// Active sessions by id
    sessions: DashMap<String, Session>,
    /// Freshness threshold passed to the resolver
    threshold_hours: f64,
    /// Idle time before a session expires
    ttl: chrono::Duration,
}

impl SessionManager {
    /// Create a new session manager over the given store.
    pub fn new(store: Arc<StateStore>, config: &ClinicalConfig) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            threshold_hours: config.threshold_hours,
            ttl: chrono::Duration::from_std(config.session_ttl())
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Freshness threshold in hours.
    pub fn threshold_hours(&self) -> f64 {
        self.threshold_hours
    }

    /// Resolve the clinical mode against the current store contents.
    pub async fn current_mode(&self) -> ClinicalMode {
        let state = self.store.load().await;
        resolve(&state, Utc::now(), self.threshold_hours)
    }

    /// Mint a new session stamped with the current clinical mode.
    pub async fn create_session(&self) -> Session {
        let mode = self.current_mode().await;
        self.insert_new(mode, Utc::now())
    }

    /// Get a session by id with its mode fields recomputed.
    ///
    /// Returns `None` for unknown or expired ids.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        let mode = self.current_mode().await;
        self.refresh_at(id, mode, Utc::now())
    }

    /// Like [`get_session`](Self::get_session), but an unknown or expired id
    /// yields a brand-new session (with a new id) instead of `None`.
    pub async fn touch_session(&self, id: Option<&str>) -> Session {
        let mode = self.current_mode().await;
        let now = Utc::now();
        if let Some(session) = id.and_then(|id| self.refresh_at(id, mode, now)) {
            return session;
        }
        if let Some(id) = id {
            debug!(requested_id = %id, "Unknown session id, creating a new session");
        }
        self.insert_new(mode, now)
    }

    /// Set the guided-flow step of a session, with its mode fields recomputed.
    ///
    /// Expired sessions are reported as missing, like in
    /// [`get_session`](Self::get_session).
    pub async fn set_step(&self, id: &str, step: u32) -> Result<Session, SessionError> {
        if step == 0 {
            return Err(SessionError::InvalidStep(step));
        }
        let mode = self.current_mode().await;
        self.set_step_at(id, step, mode, Utc::now())
    }

    /// Whether a live (unexpired) session exists.
    pub fn contains(&self, id: &str) -> bool {
        let now = Utc::now();
        self.sessions
            .get(id)
            .is_some_and(|s| !self.is_expired(s.value(), now))
    }

    /// Remove a session
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!("Removed session: {}", id);
        }
        removed
    }

    /// Number of tracked sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get statistics about the session store
    pub fn stats(&self) -> SessionStats {
        let now = Utc::now();
        let total = self.sessions.len();
        let expired = self
            .sessions
            .iter()
            .filter(|s| self.is_expired(s.value(), now))
            .count();

        SessionStats {
            total_sessions: total,
            expired_sessions: expired,
            active_sessions: total - expired,
        }
    }

    /// Drop expired sessions, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_expired(session, now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            info!("Cleaned up {} expired sessions", removed);
        }
        removed
    }

    fn insert_new(&self, mode: ClinicalMode, now: DateTime<Utc>) -> Session {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), mode, now);
        self.sessions.insert(session.id.clone(), session.clone());
        info!(
            session_id = %session.id,
            clinical_mode = %session.clinical_mode,
            mode = %session.mode,
            "Created new session"
        );
        session
    }

    fn refresh_at(&self, id: &str, mode: ClinicalMode, now: DateTime<Utc>) -> Option<Session> {
        let mut session = self.sessions.get_mut(id)?;
        if self.is_expired(&session, now) {
            drop(session);
            self.evict(id, now);
            return None;
        }
        session.refresh(mode, now);
        Some(session.clone())
    }

    fn set_step_at(
        &self,
        id: &str,
        step: u32,
        mode: ClinicalMode,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let not_found = || SessionError::NotFound(id.to_string());
        let mut session = self.sessions.get_mut(id).ok_or_else(not_found)?;
        if self.is_expired(&session, now) {
            drop(session);
            self.evict(id, now);
            return Err(not_found());
        }
        session.step = step;
        session.refresh(mode, now);
        Ok(session.clone())
    }

    fn evict(&self, id: &str, now: DateTime<Utc>) {
        if self.sessions.remove_if(id, |_, s| self.is_expired(s, now)).is_some() {
            debug!("Session expired: {}", id);
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.updated_at > self.ttl
    }
}

/// Session store statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub expired_sessions: usize,
    pub active_sessions: usize,
}
