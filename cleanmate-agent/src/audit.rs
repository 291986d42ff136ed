//! Audit trail for guardrail decisions.
//!
//! Every chat turn that reached the model records what the model proposed and
//! what the guardrail let through, so downgrades and parse failures can be
//! reviewed after the fact.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tokio::sync::RwLock;

use clinical::{ActionType, ClinicalMode, GuardrailOutcome};

use crate::backend::Usage;

/// Default number of entries kept before the oldest are dropped.
pub const DEFAULT_MAX_AUDIT_ENTRIES: usize = 1_000;

/// One guardrail decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry ID
    pub entry_id: String,
    pub session_id: String,
    /// Clinical mode the guardrail validated against
    pub clinical_mode: ClinicalMode,
    /// Type proposed by the model, verbatim
    pub raw_type: Option<String>,
    /// Type returned to the user
    pub validated_type: ActionType,
    pub parse_failed: bool,
    pub downgraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    /// Backend that produced the output
    pub backend_id: String,
    /// SHA-256 of the system instruction
    pub prompt_hash: String,
    pub usage: Usage,
    /// Model call duration
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry from a guardrail outcome.
    pub fn from_outcome(
        session_id: impl Into<String>,
        clinical_mode: ClinicalMode,
        outcome: &GuardrailOutcome,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            clinical_mode,
            raw_type: outcome.raw_type.clone(),
            validated_type: outcome.action.action_type,
            parse_failed: outcome.parse_failed,
            downgraded: outcome.downgraded,
            parse_error: outcome.parse_error.clone(),
            backend_id: String::new(),
            prompt_hash: String::new(),
            usage: Usage::default(),
            duration_ms: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Attach details of the model call.
    pub fn with_call(
        mut self,
        backend_id: impl Into<String>,
        prompt_hash: impl Into<String>,
        usage: Usage,
        duration_ms: u64,
    ) -> Self {
        self.backend_id = backend_id.into();
        self.prompt_hash = prompt_hash.into();
        self.usage = usage;
        self.duration_ms = duration_ms;
        self
    }
}

/// Hex SHA-256 of a prompt, used to tie audit entries to the exact instruction.
pub fn prompt_hash(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// Bounded, newest-first log of guardrail decisions.
pub struct AuditLog {
    /// Log entries (newest first)
    entries: RwLock<VecDeque<AuditEntry>>,
    /// Maximum entries to retain
    max_entries: usize,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_AUDIT_ENTRIES)
    }

    /// Create with custom max entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a decision, returning its entry id.
    pub async fn record(&self, entry: AuditEntry) -> String {
        let entry_id = entry.entry_id.clone();

        let mut entries = self.entries.write().await;
        entries.push_front(entry);

        // Prune if over limit
        while entries.len() > self.max_entries {
            entries.pop_back();
        }

        entry_id
    }

    /// Get recent entries.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    /// Get entries for a session.
    pub async fn get_by_session(&self, session_id: &str, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.session_id == session_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Get statistics.
    pub async fn stats(&self) -> AuditStats {
        let entries = self.entries.read().await;

        let total = entries.len();
        let parse_failures = entries.iter().filter(|e| e.parse_failed).count();
        let downgrades = entries.iter().filter(|e| e.downgraded).count();

        let avg_duration_ms = if total > 0 {
            entries.iter().map(|e| e.duration_ms).sum::<u64>() / total as u64
        } else {
            0
        };

        AuditStats {
            total_decisions: total,
            parse_failures,
            downgrades,
            avg_duration_ms,
        }
    }

    /// Get count.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics from the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_decisions: usize,
    pub parse_failures: usize,
    pub downgrades: usize,
    pub avg_duration_ms: u64,
}
