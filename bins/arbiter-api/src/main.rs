mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use arbiter_common::Config;
use arbiter_judge::{Judge, Judge0Client, LanguageResolver, PollPolicy, RedisStore, StatusTable};
use axum::Router;
use redis::aio::ConnectionManager;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub judge: Judge,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Arbiter API booting...");

    metrics::init_metrics().context("Failed to register metrics")?;
    info!("Metrics registry initialized");

    let config = Config::from_env();

    // Connect to Redis
    let client = redis::Client::open(config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to Redis: {}", config.redis_url);

    // Language and status tables, optionally overridden from disk
    let languages = match &config.language_config_path {
        Some(path) => LanguageResolver::load(Path::new(path))?,
        None => LanguageResolver::builtin()?,
    };
    info!(languages = ?languages.list_languages(), "Language table loaded");

    let statuses = match &config.status_table_path {
        Some(path) => StatusTable::load(Path::new(path))?,
        None => StatusTable::default(),
    };

    let backend = Judge0Client::new(&config.judge0)?;
    info!(
        base_url = %config.judge0.base_url,
        base64 = config.judge0.base64_encoded,
        "Remote execution client ready"
    );

    let store = Arc::new(RedisStore::new(redis_conn));
    let judge = Judge::new(
        Arc::new(backend),
        store.clone(),
        store,
        languages,
        statuses,
        PollPolicy::from(&config.poll),
    );

    let state = Arc::new(AppState { judge });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
