//! Outbound response types.

use serde::{Deserialize, Serialize};

use clinical::{ClinicalMode, Session, SessionMode, SystemState, ValidatedAction};

use crate::backend::traits::{CompletionResponse, FinishReason, Usage};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Reply to a conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Guarded assistant text
    pub message: String,
    /// Action that passed the guardrail
    pub next_action: ValidatedAction,
    /// Session posture for this turn
    pub mode: SessionMode,
    /// Full session record, including the session id to send next time
    pub session_state: Session,
}

/// Result of recording a maintenance event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status: String,
    /// Clinical mode after the event was recorded
    pub clinical_mode: ClinicalMode,
    pub history_len: usize,
}

/// State snapshot with the mode it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub clinical_mode: ClinicalMode,
    pub threshold_hours: f64,
    pub state: SystemState,
}

/// Completion backend health.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AiHealth {
    pub status: String,
    /// A backend is configured
    pub configured: bool,
    /// Model identifier of the configured backend
    pub model: Option<String>,
    /// The backend answered a health probe
    pub reachable: bool,
}

/// Reply to a quick system analysis.
///
/// Shaped like an OpenAI chat completion (`choices[0].message.content`),
/// which is what the desktop client reads. Keys are snake_case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AnalysisResponse {
    pub object: String,
    /// Model that produced the text
    pub model: String,
    pub choices: Vec<AnalysisChoice>,
    pub usage: AnalysisUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AnalysisChoice {
    pub index: u32,
    pub message: AnalysisMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AnalysisMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AnalysisUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for AnalysisUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
        }
    }
}

impl AnalysisResponse {
    /// Wrap a completion from `model`.
    pub fn from_completion(model: impl Into<String>, completion: CompletionResponse) -> Self {
        Self {
            object: "chat.completion".to_string(),
            model: model.into(),
            choices: vec![AnalysisChoice {
                index: 0,
                message: AnalysisMessage {
                    role: "assistant".to_string(),
                    content: completion.content.trim().to_string(),
                },
                finish_reason: completion.finish_reason,
            }],
            usage: completion.usage.into(),
        }
    }

    /// Text of the first choice.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map_or("", |choice| choice.message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clinical::ActionType;

    #[test]
    fn test_analysis_response_wire_format() {
        let completion = CompletionResponse {
            content: "  Diagnóstico: RAM alta.  ".to_string(),
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens: 60,
                completion_tokens: 20,
            },
        };
        let response = AnalysisResponse::from_completion("llama-3.3-70b-versatile", completion);
        assert_eq!(response.content(), "Diagnóstico: RAM alta.");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["choices"][0]["message"]["content"], "Diagnóstico: RAM alta.");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["usage"]["total_tokens"], 80);
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_chat_response_wire_format() {
        let session = Session::new("s-1", ClinicalMode::NeedsAnalysis, Utc::now());
        let response = ChatResponse {
            message: "Inicie el análisis.".to_string(),
            next_action: ValidatedAction {
                action_type: ActionType::Analyze,
                label: "Analizar sistema".to_string(),
                auto_execute: false,
            },
            mode: session.mode,
            session_state: session,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["nextAction"]["type"], "analyze");
        assert_eq!(json["nextAction"]["autoExecute"], false);
        assert_eq!(json["mode"], "guided_flow");
        assert_eq!(json["sessionState"]["id"], "s-1");
        assert_eq!(json["sessionState"]["clinicalMode"], "needs_analysis");
    }
}
