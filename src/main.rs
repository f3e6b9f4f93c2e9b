use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use course_rag_backend::core::config::{service, AppPaths, ConfigService};
use course_rag_backend::core::logging;
use course_rag_backend::server;
use course_rag_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config_service = ConfigService::new(paths.clone());
    let config = config_service.load().with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_service.config_path().display()
        )
    })?;
    tracing::debug!("Effective configuration: {}", service::redacted(&config));

    let state = AppState::initialize(&paths, config).await?;
    load_documents(&state).await;

    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Loads the configured documents folder. Failures are logged; the server
/// still starts and answers from whatever is already indexed.
async fn load_documents(state: &AppState) {
    let docs = &state.config.documents;
    if !docs.path.is_dir() {
        tracing::warn!(
            "Documents folder {} not found; skipping initial load",
            docs.path.display()
        );
        return;
    }

    tracing::info!("Loading course documents from {}", docs.path.display());
    match state
        .assistant
        .load_course_folder(&docs.path, docs.clear_existing)
        .await
    {
        Ok(report) => {
            for (path, reason) in &report.failed {
                tracing::warn!("Could not load {}: {}", path.display(), reason);
            }
            tracing::info!(
                "Loaded {} new course(s) with {} chunks; {} already present, {} failed",
                report.courses_added,
                report.chunks_added,
                report.skipped.len(),
                report.failed.len()
            );
        }
        Err(e) => tracing::error!("Initial document load failed: {}", e),
    }
}
