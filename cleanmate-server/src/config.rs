//! Configuration for the CleanMate server
//!
//! CLI arguments and environment variable handling using clap. Clinical
//! settings may also come from a YAML file (`CONFIG_PATH`); flags and
//! environment variables win over the file.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cleanmate_agent::backend::openai::{DEFAULT_MODEL, GROQ_BASE_URL};
use cleanmate_agent::ServiceConfig;
use clinical::ClinicalConfig;

/// CleanMate clinic server
#[derive(Parser, Debug, Clone)]
#[command(name = "cleanmate-server")]
#[command(about = "Clinical workflow assistant for the CleanMate cleanup utility")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Optional YAML file with clinical settings
    #[arg(long, env = "CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Durable state file [default: state/system_state.json]
    #[arg(long, env = "STATE_PATH")]
    pub state_path: Option<PathBuf>,

    /// Hours an optimization stays fresh [default: 72]
    #[arg(long, env = "CLINICAL_OPTIMIZATION_THRESHOLD_HOURS", allow_negative_numbers = true)]
    pub threshold_hours: Option<f64>,

    /// Idle seconds before a session is evicted [default: 86400]
    #[arg(long, env = "SESSION_TTL_SECONDS")]
    pub session_ttl_secs: Option<u64>,

    /// API key for the completion backend
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Legacy name for the completion API key
    #[arg(long, env = "GROQ_API_KEY", hide = true, hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long, env = "LLM_BASE_URL", default_value = GROQ_BASE_URL)]
    pub llm_base_url: String,

    /// Model identifier
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub llm_model: String,

    /// Upper bound on a single model call (milliseconds)
    #[arg(long, env = "LLM_TIMEOUT_MS", default_value = "10000")]
    pub llm_timeout_ms: u64,

    /// Maximum tokens per model reply
    #[arg(long, env = "LLM_MAX_TOKENS", default_value = "400")]
    pub llm_max_tokens: u32,

    /// Sampling temperature
    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0.3")]
    pub llm_temperature: f32,

    /// Prior turns sent with each chat request
    #[arg(long, env = "TRANSCRIPT_TURNS", default_value = "6")]
    pub transcript_turns: usize,

    /// Guardrail decisions kept in the audit log
    #[arg(long, env = "AUDIT_MAX_ENTRIES", default_value = "1000")]
    pub audit_max_entries: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Args {
    /// The completion API key, preferring `LLM_API_KEY` over `GROQ_API_KEY`.
    pub fn api_key(&self) -> Option<&str> {
        [&self.llm_api_key, &self.groq_api_key]
            .into_iter()
            .flatten()
            .map(|key| key.trim())
            .find(|key| !key.is_empty())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Clinical settings: YAML file first, then flag and env overrides.
    pub fn clinical_config(&self) -> Result<ClinicalConfig, String> {
        let mut config = match &self.config_path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                ClinicalConfig::from_yaml(&yaml)
                    .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
            }
            None => ClinicalConfig::default(),
        };

        if let Some(hours) = self.threshold_hours {
            config.threshold_hours = hours;
        }
        if let Some(ttl) = self.session_ttl_secs {
            config.session_ttl_secs = ttl;
        }
        if let Some(path) = &self.state_path {
            config.state_path = path.clone();
        }
        Ok(config)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_tokens: self.llm_max_tokens,
            temperature: self.llm_temperature,
            timeout: self.llm_timeout(),
            transcript_turns: self.transcript_turns,
            audit_max_entries: self.audit_max_entries,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.clinical_config()?.validate()?;

        if self.llm_timeout_ms == 0 {
            return Err("LLM_TIMEOUT_MS must be greater than zero".to_string());
        }

        if !self.llm_temperature.is_finite() || !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(format!(
                "LLM_TEMPERATURE must be between 0 and 2, got {}",
                self.llm_temperature
            ));
        }

        if self.audit_max_entries == 0 {
            return Err("AUDIT_MAX_ENTRIES must be greater than zero".to_string());
        }

        if !matches!(self.log_format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(format!(
                "LOG_FORMAT must be \"text\" or \"json\", got {:?}",
                self.log_format
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(flags: &[&str]) -> Args {
        let mut argv = vec!["cleanmate-server"];
        argv.extend_from_slice(flags);
        Args::parse_from(argv)
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = parse(&[
            "--listen",
            "127.0.0.1:6000",
            "--threshold-hours",
            "24",
            "--session-ttl-secs",
            "600",
            "--state-path",
            "/tmp/state.json",
        ]);

        assert_eq!(args.listen.port(), 6000);
        let config = args.clinical_config().unwrap();
        assert_eq!(config.threshold_hours, 24.0);
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_with_cli_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold_hours: 48\nsession_ttl_secs: 120").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = parse(&["--config-path", &path, "--session-ttl-secs", "300"]);
        let config = args.clinical_config().unwrap();

        assert_eq!(config.threshold_hours, 48.0);
        assert_eq!(config.session_ttl_secs, 300);
        assert_eq!(config.state_path, ClinicalConfig::default().state_path);
    }

    #[test]
    fn test_missing_config_file_is_rejected() {
        let args = parse(&["--config-path", "/nonexistent/cleanmate.yaml"]);
        assert!(args.clinical_config().is_err());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(parse(&["--threshold-hours", "0"]).validate().is_err());
        assert!(parse(&["--threshold-hours=-3"]).validate().is_err());
        assert!(parse(&["--session-ttl-secs", "0"]).validate().is_err());
        assert!(parse(&["--llm-timeout-ms", "0"]).validate().is_err());
        assert!(parse(&["--log-format", "xml"]).validate().is_err());
        assert!(parse(&["--log-format", "JSON"]).validate().is_ok());
    }

    #[test]
    fn test_api_key_precedence() {
        let args = parse(&["--groq-api-key", "gsk-legacy"]);
        assert_eq!(args.api_key(), Some("gsk-legacy"));

        let args = parse(&["--llm-api-key", "sk-new", "--groq-api-key", "gsk-legacy"]);
        assert_eq!(args.api_key(), Some("sk-new"));

        let args = parse(&["--llm-api-key", "  ", "--groq-api-key", "gsk-legacy"]);
        assert_eq!(args.api_key(), Some("gsk-legacy"));
    }

    #[test]
    fn test_service_config_mapping() {
        let args = parse(&["--llm-timeout-ms", "2500", "--transcript-turns", "2"]);
        let config = args.service_config();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.transcript_turns, 2);
        assert_eq!(config.max_tokens, 400);
    }
}
