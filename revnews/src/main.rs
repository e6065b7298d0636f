/*
revnews - single-binary main.rs
Starts the Rocket HTTP server that fronts the live-news RAG pipeline.
*/

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::{init_db_pool, Config};
use revnews::llm::remote::provider_from_config;
use revnews::llm::CompletionProvider;
use revnews::pipeline::chat::ResponseGenerator;
use revnews::pipeline::interest::InterestTranslator;
use revnews::pipeline::spectrum::SpectrumAnalyzer;
use revnews::search::{NewsSearch, RemoteNewsSearch};
use revnews::server::{self, AppState};
use revnews::Error;

#[derive(Parser, Debug)]
#[command(name = "revnews", about = "RevNews server: live news + grounded AI analysis")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await?;
    info!(default = ?default_path, overlay = ?override_path, "configuration loaded");

    // Initialize DB pool and core schema
    let db_pool = init_db_pool(&config.database.path).await?;
    server::ensure_schema(&db_pool).await?;
    info!(db_path = %config.database.path, "database ready");

    // Search capability (always constructed; a missing key surfaces later
    // as an upstream failure on the feed path)
    let search: Arc<dyn NewsSearch> = Arc::new(RemoteNewsSearch::from_config(&config.search));

    // Completion capability: without a configured credential the pipeline
    // runs in degraded mode and every consumer falls back to fixed strings.
    let completion: Option<Arc<dyn CompletionProvider>> = match &config.llm {
        Some(llm_config) => match provider_from_config(llm_config) {
            Ok(provider) => {
                info!(model = provider.model(), "completion provider initialized");
                Some(Arc::new(provider))
            }
            Err(Error::CredentialMissing) => {
                warn!("no completion credential configured; running degraded");
                None
            }
            Err(e) => {
                error!("failed to initialize completion provider: {}", e);
                None
            }
        },
        None => {
            warn!("no [llm] section in config; running degraded");
            None
        }
    };

    let state = AppState {
        started_at: Utc::now(),
        config: Arc::new(config),
        db: db_pool,
        search: search.clone(),
        generator: ResponseGenerator::new(completion.clone(), search),
        translator: InterestTranslator::new(completion.clone()),
        analyzer: SpectrumAnalyzer::new(completion),
    };

    info!("launching Rocket HTTP server");
    server::launch_rocket(state).await?;

    info!("shutdown complete");
    Ok(())
}
