mod api;
mod bootstrap;
mod health;
mod intake;

use std::time::Duration;

use anyhow::{Context, Result};
use fixquote_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

fn init_logging(config: &AppConfig) {
    use fixquote_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap so connection and migration events are visible.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let capabilities = health::Capabilities::from_config(&app.config);
    let router = api::router(app.state.clone()).merge(health::router(app.db_pool.clone(), capabilities));
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        address = %address,
        dispatch_strategy = app.state.intake.dispatch_strategy(),
        "fixquote-server listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let server_task = tokio::spawn(async move { server.await });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "fixquote-server draining in-flight requests"
    );
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(grace, server_task).await {
        Ok(joined) => joined.context("server task panicked")?.context("server exited with error")?,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }

    app.db_pool.close().await;
    tracing::info!(event_name = "system.server.stopped", "fixquote-server stopped");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
