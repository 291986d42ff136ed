//! Quick system analysis prompt.
//!
//! A one-shot request outside the guided flow: the desktop client sends host
//! load after a cleanup run and gets a few lines of advice back. No session,
//! guardrail or audit entry is involved.

use serde_json::Value;

use crate::request::AnalyzeRequest;

/// Reply budget for an analysis; the advice is meant to fit a toast.
pub const ANALYSIS_MAX_TOKENS: u32 = 180;

pub const ANALYSIS_SYSTEM_PROMPT: &str = concat!(
    "Eres CleanMateAI, un experto en mantenimiento de Windows. ",
    "Responde en español, breve y conciso."
);

const MISSING_METRIC: &str = "N/A";
const NEVER_CLEANED: &str = "Nunca";

/// User message describing the reported host state.
pub fn build_analysis_message(request: &AnalyzeRequest) -> String {
    let system = request.system_info.clone().unwrap_or_default();
    let last_cleanup = request
        .cleanup_info
        .as_ref()
        .and_then(|info| info.last_cleanup.as_ref());

    let mut message = String::new();
    message.push_str(
        "Analiza el siguiente estado del sistema y proporciona recomendaciones breves:\n\n",
    );
    message.push_str(&format!("CPU: {}%\n", display(system.cpu.as_ref(), MISSING_METRIC)));
    message.push_str(&format!(
        "RAM: {}%\n",
        display(system.ram_percent.as_ref(), MISSING_METRIC)
    ));
    message.push_str(&format!(
        "Disco: {}%\n\n",
        display(system.disk_percent.as_ref(), MISSING_METRIC)
    ));
    message.push_str(&format!(
        "Última limpieza: {}",
        display(last_cleanup, NEVER_CLEANED)
    ));
    message
}

/// Strings are shown without quotes; null counts as absent.
fn display(value: Option<&Value>, fallback: &str) -> String {
    match value {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
