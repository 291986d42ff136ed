//! Core types for the clinical workflow.
//!
//! These types model the maintenance record, the derived clinical mode and the
//! per-conversation session. Field names on the wire are camelCase so the
//! desktop frontend can consume them directly.
//!
//! With the `typescript` feature enabled, these types can be exported to
//! TypeScript using ts-rs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Derived health state of the monitored host.
///
/// Never stored; always recomputed from the State Store by
/// [`resolve`](crate::resolver::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ClinicalMode {
    /// No analysis has been recorded
    NeedsAnalysis,
    /// Analysis exists, optimization has never run
    NeedsOptimization,
    /// Recent optimization within the freshness threshold
    Stable,
    /// Optimization is stale or its timestamp is unreadable
    MaintenanceDue,
}

impl ClinicalMode {
    /// Wire/prompt representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsAnalysis => "needs_analysis",
            Self::NeedsOptimization => "needs_optimization",
            Self::Stable => "stable",
            Self::MaintenanceDue => "maintenance_due",
        }
    }

    /// Action types the guardrail lets through in this mode.
    pub fn permitted_actions(&self) -> &'static [ActionType] {
        match self {
            Self::NeedsAnalysis => &[ActionType::Analyze, ActionType::None],
            Self::NeedsOptimization => &[ActionType::Optimize, ActionType::None],
            Self::Stable => &[ActionType::None],
            Self::MaintenanceDue => &[ActionType::Optimize, ActionType::None],
        }
    }

    /// Check the mode-compatibility table.
    pub fn permits(&self, action: ActionType) -> bool {
        self.permitted_actions().contains(&action)
    }

    /// Short description used in the system instruction.
    pub fn meaning(&self) -> &'static str {
        match self {
            Self::NeedsAnalysis => "no valid analysis recorded",
            Self::NeedsOptimization => "analysis exists but optimization has not been executed",
            Self::Stable => "recent optimization with stable condition",
            Self::MaintenanceDue => "last optimization is older than the maintenance threshold",
        }
    }

    /// All modes in workflow order.
    pub fn all() -> [Self; 4] {
        [
            Self::NeedsAnalysis,
            Self::NeedsOptimization,
            Self::Stable,
            Self::MaintenanceDue,
        ]
    }
}

impl fmt::Display for ClinicalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversational posture of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Structured step-by-step guidance through analysis and optimization
    GuidedFlow,
    /// Open-ended technical Q&A once the flow is complete
    FreeConsultation,
}

impl SessionMode {
    /// Derive the posture from the flow completion flag.
    pub fn from_flow_completed(flow_completed: bool) -> Self {
        if flow_completed {
            Self::FreeConsultation
        } else {
            Self::GuidedFlow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuidedFlow => "guided_flow",
            Self::FreeConsultation => "free_consultation",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the assistant may offer the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Analyze,
    Optimize,
    None,
}

impl ActionType {
    /// Parse a model-proposed type. Matching is exact; anything else is unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "analyze" => Some(Self::Analyze),
            "optimize" => Some(Self::Optimize),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Optimize => "optimize",
            Self::None => "none",
        }
    }

    /// Button label used when the model proposes an action without one.
    pub fn default_label(&self) -> &'static str {
        match self {
            Self::Analyze => "Analizar sistema",
            Self::Optimize => "Optimizar sistema",
            Self::None => "",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of maintenance event reported by the cleanup utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Analyze,
    Optimize,
}

impl EventKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "analyze" => Some(Self::Analyze),
            "optimize" => Some(Self::Optimize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Optimize => "optimize",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed analysis or optimization.
///
/// The timestamp is kept as the raw string that was persisted: the resolver
/// must be able to see (and react to) an unparseable value. A null, missing or
/// non-string timestamp decodes as `""`, which never parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MaintenanceEvent {
    /// ISO-8601 UTC instant
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub timestamp: String,
    /// Opaque report produced by the cleanup utility
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "unknown"))]
    pub summary: serde_json::Value,
}

impl MaintenanceEvent {
    pub fn new(timestamp: impl Into<String>, summary: serde_json::Value) -> Self {
        Self {
            timestamp: timestamp.into(),
            summary,
        }
    }

    /// Stamp a report with the current UTC time.
    pub fn now(summary: serde_json::Value) -> Self {
        Self::new(utc_timestamp(Utc::now()), summary)
    }
}

/// Immutable record in the append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub timestamp: String,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "unknown"))]
    pub summary: serde_json::Value,
}

impl HistoryEntry {
    pub fn from_event(kind: EventKind, event: &MaintenanceEvent) -> Self {
        Self {
            kind,
            timestamp: event.timestamp.clone(),
            summary: event.summary.clone(),
        }
    }
}

/// Everything the State Store persists.
///
/// On disk the keys are snake_case (`last_analysis`, `last_optimization`,
/// `history`) for compatibility with existing state files.
///
/// Decoding is field by field: a slot that is null, empty or not an object is
/// absent, and a null history or an unreadable history entry is dropped. One
/// odd field never costs the rest of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SystemState {
    #[serde(default, deserialize_with = "lenient::slot")]
    pub last_analysis: Option<MaintenanceEvent>,
    #[serde(default, deserialize_with = "lenient::slot")]
    pub last_optimization: Option<MaintenanceEvent>,
    #[serde(default, deserialize_with = "lenient::history")]
    pub history: Vec<HistoryEntry>,
}

impl SystemState {
    /// The most recent history entry.
    pub fn last_event(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Latest `limit` history entries, newest first.
    pub fn recent_history(&self, limit: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev().take(limit)
    }
}

/// Field decoders for hand-edited or older state files.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{HistoryEntry, MaintenanceEvent};

    pub fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(value)) => value,
            _ => String::new(),
        })
    }

    pub fn slot<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<MaintenanceEvent>, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Object(fields)) if !fields.is_empty() => {
                serde_json::from_value(Value::Object(fields)).ok()
            }
            _ => None,
        })
    }

    pub fn history<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<HistoryEntry>, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

/// Per-conversation session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque unique token
    pub id: String,
    pub mode: SessionMode,
    pub clinical_mode: ClinicalMode,
    pub flow_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Guided-flow step, starts at 1 and is advanced by the caller
    pub step: u32,
}

impl Session {
    /// Create a fresh session stamped with the given clinical mode.
    pub fn new(id: impl Into<String>, clinical_mode: ClinicalMode, now: DateTime<Utc>) -> Self {
        let mut session = Self {
            id: id.into(),
            mode: SessionMode::GuidedFlow,
            clinical_mode,
            flow_completed: false,
            created_at: now,
            updated_at: now,
            step: 1,
        };
        session.refresh(clinical_mode, now);
        session
    }

    /// Recompute the derived fields. `created_at` and `step` are untouched.
    pub fn refresh(&mut self, clinical_mode: ClinicalMode, now: DateTime<Utc>) {
        self.clinical_mode = clinical_mode;
        self.flow_completed = clinical_mode == ClinicalMode::Stable;
        self.mode = SessionMode::from_flow_completed(self.flow_completed);
        self.updated_at = now;
    }
}

/// Proposed next action as it arrived from the model (untrusted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProposal {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub auto_execute: bool,
}

/// Action that passed the guardrail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ValidatedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub label: String,
    pub auto_execute: bool,
}

impl ValidatedAction {
    /// The inert action: no button, nothing to run.
    pub fn none() -> Self {
        Self {
            action_type: ActionType::None,
            label: String::new(),
            auto_execute: false,
        }
    }

    pub fn is_none(&self) -> bool {
        self.action_type == ActionType::None
    }
}

impl Default for ValidatedAction {
    fn default() -> Self {
        Self::none()
    }
}

/// Live host metrics the frontend may attach to a chat turn.
///
/// Values are passed through as-is; the frontend sends numbers, older builds
/// send preformatted strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub cpu_load: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub ram_used: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub disk_used: Option<serde_json::Value>,
    #[serde(default, rename = "diskFreeGB")]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub disk_free_gb: Option<serde_json::Value>,
}

/// Format an instant the way the store persists it: UTC with trailing `Z`.
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_permitted_actions_table() {
        assert!(ClinicalMode::NeedsAnalysis.permits(ActionType::Analyze));
        assert!(!ClinicalMode::NeedsAnalysis.permits(ActionType::Optimize));
        assert!(ClinicalMode::NeedsOptimization.permits(ActionType::Optimize));
        assert!(!ClinicalMode::NeedsOptimization.permits(ActionType::Analyze));
        assert_eq!(ClinicalMode::Stable.permitted_actions(), &[ActionType::None]);
        assert!(ClinicalMode::MaintenanceDue.permits(ActionType::Optimize));
        assert!(!ClinicalMode::MaintenanceDue.permits(ActionType::Analyze));

        for mode in ClinicalMode::all() {
            assert!(mode.permits(ActionType::None));
        }
    }

    #[test]
    fn test_session_refresh_derives_mode() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut session = Session::new("s-1", ClinicalMode::NeedsAnalysis, t0);
        assert_eq!(session.mode, SessionMode::GuidedFlow);
        assert!(!session.flow_completed);
        assert_eq!(session.step, 1);

        let t1 = t0 + chrono::Duration::minutes(5);
        session.step = 3;
        session.refresh(ClinicalMode::Stable, t1);
        assert_eq!(session.mode, SessionMode::FreeConsultation);
        assert!(session.flow_completed);
        assert_eq!(session.created_at, t0);
        assert_eq!(session.updated_at, t1);
        assert_eq!(session.step, 3);
    }

    #[test]
    fn test_session_wire_format() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let session = Session::new("s-1", ClinicalMode::MaintenanceDue, t0);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["mode"], "guided_flow");
        assert_eq!(json["clinicalMode"], "maintenance_due");
        assert_eq!(json["flowCompleted"], false);
        assert!(json["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_state_file_keys() {
        let raw = r#"{
            "last_analysis": {"timestamp": "2026-01-01T00:00:00Z", "summary": {"fileCount": 3}},
            "history": []
        }"#;
        let state: SystemState = serde_json::from_str(raw).unwrap();
        assert!(state.last_analysis.is_some());
        assert!(state.last_optimization.is_none());
    }

    #[test]
    fn test_state_file_odd_fields_decode_per_field() {
        let raw = r#"{
            "last_analysis": {"timestamp": "2026-05-01T08:00:00Z", "summary": {"fileCount": 3}},
            "last_optimization": {"timestamp": null, "summary": {}},
            "history": null
        }"#;
        let state: SystemState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.last_analysis.unwrap().summary["fileCount"], 3);
        assert_eq!(state.last_optimization.unwrap().timestamp, "");
        assert!(state.history.is_empty());

        let raw = r#"{
            "last_analysis": {"summary": {"fileCount": 1}},
            "last_optimization": {},
            "history": [
                {"type": "analyze", "timestamp": 1714550400, "summary": {}},
                {"type": "defrag", "timestamp": "2026-05-01T08:00:00Z", "summary": {}},
                "garbage"
            ]
        }"#;
        let state: SystemState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.last_analysis.unwrap().timestamp, "");
        assert!(state.last_optimization.is_none());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].kind, EventKind::Analyze);
        assert_eq!(state.history[0].timestamp, "");
    }

    #[test]
    fn test_utc_timestamp_has_z_suffix() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(utc_timestamp(at), "2026-03-04T05:06:07.000Z");
    }
}
