//! OneClick - Main Application Entry Point
//!
//! Runs the work item rules engine behind an HTTP form host bridge.

use anyhow::Context;
use oneclick_api::{AppState, SeedData};
use oneclick_engine::EngineConfig;
use oneclick_storage::{FileCacheConfig, FileLocalCache, InMemoryStorage};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,oneclick=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .context("PORT must be a valid u16")?;

    let work_item_type = std::env::var("ONECLICK_WORK_ITEM_TYPE")
        .unwrap_or_else(|_| oneclick_api::state::DEFAULT_WORK_ITEM_TYPE.to_string());
    let project_id = std::env::var("ONECLICK_PROJECT_ID")
        .unwrap_or_else(|_| oneclick_api::state::DEFAULT_PROJECT_ID.to_string());

    tracing::info!(
        "Starting OneClick server on {}:{} for {} in project {}",
        host,
        port,
        work_item_type,
        project_id
    );

    let storage = Arc::new(InMemoryStorage::new());

    // Seed the in-memory backend
    if let Ok(seed_path) = std::env::var("ONECLICK_SEED_PATH") {
        let json = std::fs::read_to_string(&seed_path)
            .with_context(|| format!("Failed to read seed file {}", seed_path))?;
        let seed = SeedData::from_json(&json)
            .with_context(|| format!("Invalid seed file {}", seed_path))?;
        let count = seed.apply(&storage, &work_item_type, &project_id);
        tracing::info!("Seeded {} rules from {}", count, seed_path);
    }

    let cache_config = match std::env::var("ONECLICK_CACHE_DIR") {
        Ok(dir) => FileCacheConfig {
            directory: dir.into(),
        },
        Err(_) => FileCacheConfig::default(),
    };
    let local_cache = Arc::new(FileLocalCache::new(cache_config)?);

    // Create shared application state
    let app_state = Arc::new(AppState::with_storage(
        storage,
        local_cache,
        EngineConfig::from_env(),
        &work_item_type,
        &project_id,
    ));

    tracing::info!(
        contribution_id = app_state.contribution_id(),
        "Rule dispatcher registered with form host"
    );

    // Build our application with routes
    let app = oneclick_api::create_router(app_state.clone());

    // Run it
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    axum::serve(listener, app).await?;

    app_state.dispatcher.engine().background().drain().await;
    Ok(())
}
