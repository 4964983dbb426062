use anyhow::Context;
use dotenvy::dotenv;
use tourdesk::logging::init_tracing;
use tourdesk::metrics::init_metrics;
use tourdesk::router::init_router;
use tourdesk::state::init_app_state;
use tourdesk_config::AppConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing()?;

    let config = AppConfig::from_env();
    let metrics = init_metrics()?;
    let state = init_app_state(&config).await?;

    if let Some(interval) = config.ratings.reconcile_interval {
        info!(?interval, "starting rating reconciliation sweep");
        state.ratings.clone().spawn_sweep(interval);
    }

    let app = init_router(state, metrics);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(%address, environment = ?config.environment, "🚀 Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
