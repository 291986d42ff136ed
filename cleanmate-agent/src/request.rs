//! Inbound request types.
//!
//! Field names match the JSON sent by the desktop frontend.

use serde::{Deserialize, Serialize};

use clinical::{EventKind, MaintenanceEvent, SystemMetrics};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Longest user message accepted for a single turn (characters).
pub const MAX_USER_MESSAGE_CHARS: usize = 4_000;

/// A conversational turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Session to continue; absent or unknown ids start a new session
    #[serde(default)]
    pub session_id: Option<String>,
    /// What the user typed (`message` is accepted for older clients)
    #[serde(alias = "message")]
    pub user_message: String,
    /// Optional live context from the frontend
    #[serde(default)]
    pub context: Option<ChatContext>,
}

impl ChatRequest {
    /// Create a request with a user message.
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    /// Continue an existing session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach host metrics.
    pub fn with_metrics(mut self, metrics: SystemMetrics) -> Self {
        self.context = Some(ChatContext {
            system_metrics: Some(metrics),
        });
        self
    }

    /// Metrics attached to the turn, if any.
    pub fn metrics(&self) -> Option<&SystemMetrics> {
        self.context.as_ref().and_then(|c| c.system_metrics.as_ref())
    }

    /// Validate the request shape.
    pub fn validate(&self) -> Result<(), String> {
        let message = self.user_message.trim();
        if message.is_empty() {
            return Err("userMessage must not be empty".to_string());
        }
        if message.chars().count() > MAX_USER_MESSAGE_CHARS {
            return Err(format!(
                "userMessage exceeds {} characters",
                MAX_USER_MESSAGE_CHARS
            ));
        }
        if matches!(&self.session_id, Some(id) if id.trim().is_empty()) {
            return Err("sessionId must not be blank".to_string());
        }
        Ok(())
    }
}

/// Live context attached to a chat turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    #[serde(default)]
    pub system_metrics: Option<SystemMetrics>,
}

/// A maintenance event reported by the cleanup utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct IngestRequest {
    /// `"analyze"` or `"optimize"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Report produced by the utility; stored verbatim as the summary
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, unknown> | null"))]
    pub report: Option<serde_json::Value>,
}

impl IngestRequest {
    pub fn new(kind: impl Into<String>, report: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            report: Some(report),
        }
    }

    /// Validate and split into the event kind and its stamped event.
    pub fn into_event(self) -> Result<(EventKind, MaintenanceEvent), String> {
        let kind = EventKind::parse(self.kind.trim()).ok_or_else(|| {
            format!("type must be \"analyze\" or \"optimize\", got {:?}", self.kind)
        })?;

        match self.report {
            Some(report @ serde_json::Value::Object(_)) => {
                Ok((kind, MaintenanceEvent::now(report)))
            }
            Some(serde_json::Value::Null) | None => Err("report is required".to_string()),
            Some(_) => Err("report must be a JSON object".to_string()),
        }
    }
}

/// Quick system check sent by the desktop client after a cleanup run.
///
/// Keys are snake_case on the wire. Metric values are passed through as sent,
/// numbers or strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AnalyzeRequest {
    /// Required; may be empty
    #[serde(default)]
    pub system_info: Option<SystemInfo>,
    #[serde(default)]
    pub cleanup_info: Option<CleanupInfo>,
}

impl AnalyzeRequest {
    pub fn new(system_info: SystemInfo) -> Self {
        Self {
            system_info: Some(system_info),
            cleanup_info: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup_info: CleanupInfo) -> Self {
        self.cleanup_info = Some(cleanup_info);
        self
    }

    /// Validate the request shape.
    pub fn validate(&self) -> Result<(), String> {
        if self.system_info.is_none() {
            return Err("system_info is required".to_string());
        }
        Ok(())
    }
}

/// Host load reported with an analysis request (percentages).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SystemInfo {
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub cpu: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub ram_percent: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | string | null"))]
    pub disk_percent: Option<serde_json::Value>,
}

/// Outcome of the last cleanup run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CleanupInfo {
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "string | null"))]
    pub last_cleanup: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | null"))]
    pub freed_mb: Option<serde_json::Value>,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "number | null"))]
    pub files_deleted: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_wire_format() {
        let request: ChatRequest = serde_json::from_value(json!({
            "sessionId": "s-1",
            "userMessage": "hola",
            "context": {"systemMetrics": {"cpuLoad": 12, "diskFreeGB": 40.5}}
        }))
        .unwrap();

        assert_eq!(request.session_id.as_deref(), Some("s-1"));
        assert_eq!(request.metrics().unwrap().cpu_load, Some(json!(12)));
        assert_eq!(request.metrics().unwrap().disk_free_gb, Some(json!(40.5)));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_legacy_message_field() {
        let request: ChatRequest = serde_json::from_value(json!({"message": "hola"})).unwrap();
        assert_eq!(request.user_message, "hola");
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_chat_request_validation() {
        assert!(ChatRequest::new("   ").validate().is_err());
        assert!(ChatRequest::new("x".repeat(MAX_USER_MESSAGE_CHARS + 1)).validate().is_err());
        assert!(ChatRequest::new("hola").with_session(" ").validate().is_err());
    }

    #[test]
    fn test_analyze_request_wire_format() {
        let request: AnalyzeRequest = serde_json::from_value(json!({
            "system_info": {"cpu": 37.5, "ram_percent": 81, "disk_percent": "64"},
            "cleanup_info": {
                "last_cleanup": "2026-05-01T08:00:00Z",
                "freed_mb": 512,
                "files_deleted": 90
            }
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        let info = request.system_info.unwrap();
        assert_eq!(info.cpu, Some(json!(37.5)));
        assert_eq!(info.disk_percent, Some(json!("64")));
        assert_eq!(request.cleanup_info.unwrap().freed_mb, Some(json!(512)));

        let empty: AnalyzeRequest = serde_json::from_value(json!({"system_info": {}})).unwrap();
        assert!(empty.validate().is_ok());

        let missing: AnalyzeRequest = serde_json::from_value(json!({"cleanup_info": {}})).unwrap();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_ingest_validation() {
        let (kind, event) = IngestRequest::new("analyze", json!({"fileCount": 3}))
            .into_event()
            .unwrap();
        assert_eq!(kind, EventKind::Analyze);
        assert_eq!(event.summary["fileCount"], 3);
        assert!(event.timestamp.ends_with('Z'));

        assert!(IngestRequest::new("cleanup", json!({})).into_event().is_err());
        assert!(IngestRequest::new("optimize", json!(null)).into_event().is_err());
        assert!(IngestRequest::new("optimize", json!([1])).into_event().is_err());

        let missing: IngestRequest = serde_json::from_value(json!({"type": "optimize"})).unwrap();
        assert!(missing.into_event().is_err());
    }
}
