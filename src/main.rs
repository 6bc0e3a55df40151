use anyhow::Context;
use webshop_search::{app::App, config::Config, metrics, scheduler::SyncScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    webshop_search::app::init_tracing(&config.observability);
    tracing::info!("Starting webshop-search v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let app = App::build(config, true)
        .await
        .context("failed to build components")?;
    app.declare_index()
        .await
        .context("search engine refused the index declaration")?;

    let pending = app.backlog.count().await?;
    tracing::info!(pending = pending, "Backlog opened");

    // Catch up before the first tick
    match app.synchronizer.run().await {
        Ok(report) => tracing::info!(confirmed = report.confirmed, pending = report.pending, "Initial synchronization finished"),
        Err(e) => tracing::error!(error = %e, "Initial synchronization failed"),
    }

    let mut scheduler = SyncScheduler::new(&app.config.sync, app.synchronizer.clone()).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await?;
    if app.synchronizer.is_running() {
        tracing::warn!("Synchronization in progress; unconfirmed entries stay pending");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
