use std::sync::Arc;

use clap::Parser;
use outreach_core::genai::{self, GenerationClientConfig};
use outreach_core::OutreachConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use outreach_server::auth::HttpAuthClient;
use outreach_server::http::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "outreach.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match OutreachConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match outreach_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match outreach_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Outreach DB health check passed");
        return Ok(());
    }

    // Generation backend (GOOGLE_API_KEY from the environment)
    let mut genai_config = GenerationClientConfig::new(None, config.generation.model.clone());
    genai_config.max_retries = config.generation.max_retries as usize;
    genai_config.retry_delay_ms = config.generation.retry_delay_ms;
    genai_config.timeout_seconds = config.generation.request_timeout_seconds;

    let backend = match genai::create_client(genai_config) {
        Ok(b) => Arc::from(b),
        Err(e) => {
            eprintln!("Failed to create generation backend: {}", e);
            std::process::exit(1);
        }
    };

    // Auth collaborator
    let auth = match HttpAuthClient::new(config.auth.base_url.clone()) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            eprintln!("Failed to create auth client: {}", e);
            std::process::exit(1);
        }
    };

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(AppState {
        pool,
        config,
        backend,
        auth,
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
