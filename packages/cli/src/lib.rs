// ABOUTME: Server wiring for the crowbox binary
// ABOUTME: Opens the store, builds the sandbox manager and serves the compile API

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use crowbox_api::{create_router, AppState};
use crowbox_sandbox::{CleanupScheduler, EngineConfig, ProcessRunner, SandboxManager, SqliteStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod config;

use config::ServerConfig;

/// Sandbox engine backed by the real docker CLI and the SQLite store at `database_url`
pub async fn build_manager(
    engine: EngineConfig,
    database_url: &str,
) -> anyhow::Result<(Arc<SandboxManager>, Arc<SqliteStore>)> {
    let store = Arc::new(
        SqliteStore::connect(database_url)
            .await
            .with_context(|| format!("Failed to open database {}", database_url))?,
    );

    let manager = Arc::new(SandboxManager::new(
        engine,
        Arc::new(ProcessRunner::new()),
        store.clone(),
        store.clone(),
    ));

    Ok((manager, store))
}

pub async fn run_server(
    config: ServerConfig,
    engine: EngineConfig,
    with_scheduler: bool,
) -> anyhow::Result<()> {
    let sweep_at = engine.sweep_at;
    let (manager, _store) = build_manager(engine, &config.database_url).await?;

    let scheduler = CleanupScheduler::new(manager.clone(), sweep_at);
    if with_scheduler {
        scheduler.start().await;
    }

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin {}", config.cors_origin))?,
        )
        .allow_methods([Method::POST])
        .allow_headers(Any);

    let app = create_router(AppState { manager })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
