//! matching-service: tag, interaction and match based user recommendations
//!
//! Configuration priority: command line / environment > TOML file > built-in
//! defaults.

use anyhow::{Context, Result};
use clap::Parser;
use matching_common::cache::{build_cache_store, spawn_purge_task};
use matching_common::config::{default_config_path, TomlConfig};
use matching_common::db::init::init_database;
use matching_service::{build_router, AppState, CacheTtls, RequestDefaults};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "matching-service", version, about = "User matching and recommendation service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "MATCHING_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MATCHING_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides the config file)
    #[arg(short, long, env = "MATCHING_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    // Loaded before tracing init so the configured level applies
    let config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
    );
    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }

    info!("Starting matching-service v{}", env!("CARGO_PKG_VERSION"));
    if !config_path.exists() {
        info!("No config file at {}, using defaults", config_path.display());
    }

    let db_path = args.database.unwrap_or_else(|| config.database_path());
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let cache = build_cache_store(config.cache.backend, &pool);
    info!("Cache backend: {:?}", config.cache.backend);
    spawn_purge_task(cache.clone(), config.cache.purge_interval());

    let defaults = RequestDefaults::load(&pool).await?;
    let state = AppState::new(pool, cache, CacheTtls::from(&config.cache)).with_defaults(defaults);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("matching-service listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
