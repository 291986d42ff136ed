//! Action guardrail.
//!
//! The completion model is an untrusted text generator. Whatever it returns is
//! parsed into a tagged result and then clamped against the mode-compatibility
//! table, so no model output can surface an action the current clinical mode
//! does not allow.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ActionProposal, ActionType, ClinicalMode, ValidatedAction};

/// Shown to the user when the model produced nothing readable.
pub const FALLBACK_MESSAGE: &str =
    "No se pudo generar una respuesta legible. Intenta reformular tu consulta.";

/// Structured reply expected from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub message: String,
    pub next_action: ActionProposal,
}

/// Why raw model output could not be read as a [`ModelReply`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Output was empty or whitespace
    #[error("Model output is empty")]
    Empty,

    /// No JSON object could be found in the output
    #[error("Model output is not JSON: {0}")]
    NotJson(String),

    /// JSON was found but does not have the expected fields/types
    #[error("Model output has the wrong shape: {0}")]
    WrongShape(String),
}

/// Wire shape of the reply. Optional fields tolerate `null`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    message: String,
    next_action: RawAction,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    auto_execute: Option<bool>,
}

/// Parse raw model output.
///
/// The whole (trimmed) text is tried first; failing that, a fenced code block
/// and then the outermost `{ ... }` span, since models tend to wrap JSON in
/// prose or markdown despite instructions.
pub fn parse_model_output(raw: &str) -> Result<ModelReply, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut last_error = None;
    for candidate in json_candidates(trimmed) {
        let value: serde_json::Value = match serde_json::from_str(candidate) {
            Ok(value) => value,
            Err(e) => {
                last_error = Some(ParseError::NotJson(e.to_string()));
                continue;
            }
        };
        return serde_json::from_value::<RawReply>(value)
            .map(|reply| ModelReply {
                message: reply.message,
                next_action: ActionProposal {
                    action_type: reply.next_action.action_type,
                    label: reply.next_action.label.unwrap_or_default(),
                    auto_execute: reply.next_action.auto_execute.unwrap_or(false),
                },
            })
            .map_err(|e| ParseError::WrongShape(e.to_string()));
    }

    Err(last_error.unwrap_or_else(|| ParseError::NotJson("no JSON object found".to_string())))
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            candidates.push(body[..end].trim());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

/// Outcome of running the guardrail over one model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailOutcome {
    /// Action that may be shown to the user
    pub action: ValidatedAction,
    /// Text that may be shown to the user
    pub user_message: String,
    /// Type the model proposed, verbatim (`None` on parse failure)
    pub raw_type: Option<String>,
    /// Output did not match the expected structure
    pub parse_failed: bool,
    /// Proposed action was replaced with `none`
    pub downgraded: bool,
    /// Parse failure detail, for the audit trail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Validate raw model output against the clinical mode.
pub fn validate(raw_model_output: &str, mode: ClinicalMode) -> GuardrailOutcome {
    match parse_model_output(raw_model_output) {
        Ok(reply) => validate_reply(reply, mode),
        Err(e) => {
            debug!(error = %e, clinical_mode = %mode, "Model output failed to parse");
            GuardrailOutcome {
                action: ValidatedAction::none(),
                user_message: non_empty_or_fallback(raw_model_output),
                raw_type: None,
                parse_failed: true,
                downgraded: false,
                parse_error: Some(e.to_string()),
            }
        }
    }
}

/// Validate an already parsed reply.
pub fn validate_reply(reply: ModelReply, mode: ClinicalMode) -> GuardrailOutcome {
    let proposal = reply.next_action;
    let action = clamp(&proposal, mode);
    let downgraded = action.is_none() && proposal.action_type != ActionType::None.as_str();

    GuardrailOutcome {
        action,
        user_message: non_empty_or_fallback(&reply.message),
        raw_type: Some(proposal.action_type),
        parse_failed: false,
        downgraded,
        parse_error: None,
    }
}

/// Clamp a proposal to the mode-compatibility table.
///
/// Type matching is exact: case or surrounding whitespace makes a type
/// unknown. Unknown types and types not permitted in `mode` become the inert
/// `none` action; `none` never auto-executes.
pub fn clamp(proposal: &ActionProposal, mode: ClinicalMode) -> ValidatedAction {
    let Some(action_type) = ActionType::parse(&proposal.action_type) else {
        return ValidatedAction::none();
    };
    if action_type == ActionType::None || !mode.permits(action_type) {
        return ValidatedAction::none();
    }

    let label = proposal.label.trim();
    ValidatedAction {
        action_type,
        label: if label.is_empty() {
            action_type.default_label().to_string()
        } else {
            label.to_string()
        },
        auto_execute: proposal.auto_execute,
    }
}

fn non_empty_or_fallback(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}
