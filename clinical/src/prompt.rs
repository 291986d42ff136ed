//! Prompt assembly for the completion model.
//!
//! The system instruction carries the authoritative session and clinical mode
//! plus the per-mode action rules. The context message carries the maintenance
//! record and the user's text. The model output is still untrusted; see
//! [`guardrail`](crate::guardrail).

use std::fmt::Write;

use crate::types::{
    ActionType, ClinicalMode, HistoryEntry, MaintenanceEvent, Session, SystemMetrics, SystemState,
};

/// History entries included in the context message.
pub const CONTEXT_HISTORY_LIMIT: usize = 5;

const PERSONA: &str = "\
You are CleanMate System Doctor, a clinical technical specialist for Windows systems.
You are not a generic chatbot.

You have two operating modes controlled only by the backend:

1) guided_flow
   You drive the structured diagnostic and optimization flow of CleanMate.
   You only ask questions and give instructions that belong to this flow.
   You do not answer unrelated questions and you gently redirect the user.

2) free_consultation
   The main clinical flow has been completed successfully.
   You can answer free technical questions about hardware, software, diagnostics and optimization.
   You always stay within the CleanMate domain: system health, performance and maintenance.

The frontend never decides the mode.
The backend gives you SESSION_MODE and CLINICAL_MODE.
Never contradict them.";

const BEHAVIOR: &str = "\
Behavior rules:

If SESSION_MODE is \"guided_flow\":
- Focus on leading the next clinical step.
- Stay procedural and concise.
- If the user tries to change topic, briefly answer if it is still about system health \
or politely redirect back to the flow.

If SESSION_MODE is \"free_consultation\":
- Answer technical questions about hardware, software, diagnostics and optimization.
- You may reference past analyses and optimizations.
- Do not reopen the guided flow unless the user explicitly asks to run a new analysis \
or optimization.";

const STYLE_AND_FORMAT: &str = "\
Communication style:
- Spanish language.
- Professional, direct and calm.
- Short structured paragraphs, maximum 6 lines.
- No emojis, no jokes, no motivational tone.

Response format (mandatory):

Return only one JSON object:

{
\"message\": \"Explicación técnica en español. Clara, estructurada y profesional.\",
\"nextAction\": {
\"type\": \"analyze\" | \"optimize\" | \"none\",
\"label\": \"Etiqueta corta en español para el botón\",
\"autoExecute\": false
}
}

No texto adicional.
No markdown.";

/// Assembles the messages sent to the completion model.
pub struct PromptAssembler;

impl PromptAssembler {
    /// Build the system instruction for a session.
    ///
    /// Contains the literal `SESSION_MODE:`, `CLINICAL_MODE:` and
    /// `FLOW_COMPLETED:` lines and the action rules for every mode, with the
    /// session's own mode restated last.
    pub fn build_system_prompt(session: &Session) -> String {
        let mut prompt = String::new();

        prompt.push_str(PERSONA);
        prompt.push_str("\n\n");

        let _ = writeln!(prompt, "SESSION_MODE: {}", session.mode);
        let _ = writeln!(prompt, "CLINICAL_MODE: {}", session.clinical_mode);
        let _ = writeln!(prompt, "FLOW_COMPLETED: {}", session.flow_completed);

        prompt.push_str("\nCLINICAL_MODE meanings:\n");
        for mode in ClinicalMode::all() {
            let _ = writeln!(prompt, "- {}: {}.", mode, mode.meaning());
        }

        prompt.push('\n');
        prompt.push_str(BEHAVIOR);
        prompt.push_str("\n\nAction decision rules for nextAction:\n");
        for mode in ClinicalMode::all() {
            let _ = write!(prompt, "\n{}", Self::action_rule(mode));
        }
        prompt.push_str("\nIf information is insufficient, choose type \"none\".\n");

        let _ = writeln!(
            prompt,
            "\nFor this session (CLINICAL_MODE == \"{}\") the only allowed nextAction \
             types are: {}.",
            session.clinical_mode,
            Self::allowed_list(session.clinical_mode)
        );

        prompt.push('\n');
        prompt.push_str(STYLE_AND_FORMAT);
        prompt
    }

    /// Build the user-role context message for one turn.
    pub fn build_context_message(
        state: &SystemState,
        metrics: Option<&SystemMetrics>,
        user_message: &str,
    ) -> String {
        let mut message = String::new();

        message.push_str("CURRENT METRICS:\n");
        let metrics = metrics.cloned().unwrap_or_default();
        let _ = writeln!(message, "CPU: {}%", metric(&metrics.cpu_load));
        let _ = writeln!(message, "RAM: {}%", metric(&metrics.ram_used));
        let _ = writeln!(message, "Disk: {}%", metric(&metrics.disk_used));
        let _ = writeln!(message, "DiskFreeGB: {}", metric(&metrics.disk_free_gb));

        message.push_str("\nLAST ANALYSIS REPORT:\n");
        message.push_str(&report(state.last_analysis.as_ref()));

        message.push_str("\n\nLAST OPTIMIZATION REPORT:\n");
        message.push_str(&report(state.last_optimization.as_ref()));

        message.push_str("\n\nRECENT HISTORY (newest first):\n");
        let mut any = false;
        for entry in state.recent_history(CONTEXT_HISTORY_LIMIT) {
            message.push_str(&history_line(entry));
            message.push('\n');
            any = true;
        }
        if !any {
            message.push_str("None\n");
        }

        message.push_str("\nUSER MESSAGE:\n");
        message.push_str(user_message.trim());
        message
    }

    fn action_rule(mode: ClinicalMode) -> String {
        let header = format!("If CLINICAL_MODE == \"{mode}\":\n");
        let body = match mode {
            ClinicalMode::NeedsAnalysis => {
                "- nextAction.type may only be \"analyze\" or \"none\".\n\
                 - Never return \"optimize\".\n"
            }
            ClinicalMode::NeedsOptimization => {
                "- nextAction.type may only be \"optimize\" or \"none\".\n\
                 - Never return \"analyze\".\n"
            }
            ClinicalMode::Stable => "- nextAction.type must be \"none\".\n",
            ClinicalMode::MaintenanceDue => {
                "- nextAction.type may only be \"optimize\" or \"none\".\n\
                 - Never return \"analyze\".\n"
            }
        };
        header + body
    }

    fn allowed_list(mode: ClinicalMode) -> String {
        mode.permitted_actions()
            .iter()
            .map(ActionType::as_str)
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn metric(value: &Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "N/A".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn report(event: Option<&MaintenanceEvent>) -> String {
    match event {
        Some(event) => format!("timestamp={} summary={}", event.timestamp, event.summary),
        None => "None".to_string(),
    }
}

fn history_line(entry: &HistoryEntry) -> String {
    format!("- {} at {}: {}", entry.kind, entry.timestamp, entry.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, MaintenanceEvent};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn session(mode: ClinicalMode) -> Session {
        Session::new("s-1", mode, Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_system_prompt_carries_mode_lines() {
        let prompt =
            PromptAssembler::build_system_prompt(&session(ClinicalMode::NeedsOptimization));
        assert!(prompt.contains("SESSION_MODE: guided_flow"));
        assert!(prompt.contains("CLINICAL_MODE: needs_optimization"));
        assert!(prompt.contains("FLOW_COMPLETED: false"));
        assert!(prompt.contains("the only allowed nextAction types are: \"optimize\", \"none\"."));
    }

    #[test]
    fn test_stable_prompt_is_free_consultation() {
        let prompt = PromptAssembler::build_system_prompt(&session(ClinicalMode::Stable));
        assert!(prompt.contains("SESSION_MODE: free_consultation"));
        assert!(prompt.contains("FLOW_COMPLETED: true"));
        assert!(prompt.contains("the only allowed nextAction types are: \"none\"."));
    }

    #[test]
    fn test_system_prompt_lists_every_mode_rule() {
        let prompt = PromptAssembler::build_system_prompt(&session(ClinicalMode::NeedsAnalysis));
        for mode in ClinicalMode::all() {
            assert!(prompt.contains(&format!("If CLINICAL_MODE == \"{mode}\":")));
            assert!(prompt.contains(mode.meaning()));
        }
        assert!(prompt.contains("Return only one JSON object"));
        assert!(prompt.contains("Spanish language."));
    }

    #[test]
    fn test_context_message_with_empty_state() {
        let message =
            PromptAssembler::build_context_message(&SystemState::default(), None, "  hola  ");

        assert!(message.contains("CPU: N/A%"));
        assert!(message.contains("DiskFreeGB: N/A"));
        assert!(message.contains("LAST ANALYSIS REPORT:\nNone"));
        assert!(message.contains("LAST OPTIMIZATION REPORT:\nNone"));
        assert!(message.contains("RECENT HISTORY (newest first):\nNone"));
        assert!(message.ends_with("USER MESSAGE:\nhola"));
    }

    #[test]
    fn test_context_message_block_order_and_content() {
        let mut state = SystemState {
            last_analysis: Some(MaintenanceEvent::new(
                "2026-05-01T08:00:00.000Z",
                json!({"recoverableMB": 512}),
            )),
            ..Default::default()
        };
        for i in 0..7 {
            state.history.push(HistoryEntry {
                kind: EventKind::Analyze,
                timestamp: format!("t{i}"),
                summary: json!({}),
            });
        }
        let metrics = SystemMetrics {
            cpu_load: Some(json!(37.5)),
            ram_used: Some(json!("61")),
            ..Default::default()
        };

        let message = PromptAssembler::build_context_message(&state, Some(&metrics), "¿Qué hago?");

        assert!(message.contains("CPU: 37.5%"));
        assert!(message.contains("RAM: 61%"));
        assert!(message.contains("Disk: N/A%"));
        assert!(message.contains("\"recoverableMB\":512"));
        assert!(message.contains("- analyze at t6"));
        assert!(!message.contains("at t1:"));

        let order = [
            "CURRENT METRICS",
            "LAST ANALYSIS REPORT",
            "LAST OPTIMIZATION REPORT",
            "RECENT HISTORY",
            "USER MESSAGE",
        ];
        let positions: Vec<_> = order.iter().map(|label| message.find(label).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
