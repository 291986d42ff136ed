//! CleanMate server binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cleanmate_agent::backend::openai::GROQ_BASE_URL;
use cleanmate_agent::{ClinicService, LlmBackend, OpenAiBackend};
use cleanmate_server::{config::Args, server, AppState};
use clinical::{SessionManager, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "cleanmate_server={0},cleanmate_agent={0},clinical={0},info",
            log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }
    let clinical_config = args
        .clinical_config()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!("======================================");
    info!("  CleanMate - clinic assistant server");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("State file: {}", clinical_config.state_path.display());
    info!("Optimization threshold: {}h", clinical_config.threshold_hours);
    info!("Session TTL: {}s", clinical_config.session_ttl_secs);
    info!("Model: {} via {}", args.llm_model, args.llm_base_url);
    info!("======================================");

    let store = Arc::new(StateStore::open(clinical_config.state_path.clone()));
    let sessions = Arc::new(SessionManager::new(store.clone(), &clinical_config));

    // Load once so a missing or corrupt file is healed before the first request
    let initial_mode = sessions.current_mode().await;
    info!(clinical_mode = %initial_mode, "State loaded");

    let backend: Option<Arc<dyn LlmBackend>> = match args.api_key() {
        Some(key) => Some(Arc::new(OpenAiBackend::new(
            args.llm_base_url.as_str(),
            args.llm_model.as_str(),
            Some(key.to_string()),
            args.llm_timeout(),
        )?)),
        // Local OpenAI-compatible servers usually need no key
        None if args.llm_base_url.trim_end_matches('/') != GROQ_BASE_URL => {
            Some(Arc::new(OpenAiBackend::new(
                args.llm_base_url.as_str(),
                args.llm_model.as_str(),
                None,
                args.llm_timeout(),
            )?))
        }
        None => {
            warn!("LLM_API_KEY is not set - chat is disabled, ingestion still works");
            None
        }
    };

    let service = Arc::new(ClinicService::with_config(
        store,
        sessions,
        backend,
        args.service_config(),
    ));
    service.spawn_cleanup_task(clinical_config.session_cleanup_interval());

    let state = Arc::new(AppState::new(args, service));
    server::run(state).await?;

    Ok(())
}
