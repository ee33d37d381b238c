//! Pricecheck - live cross-feed price consistency monitor
//!
//! Main entry point: runs both feeds and the reconciler until Ctrl+C

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pricecheck_core::FeedSource;
use pricecheck_monitor::load_settings;
use pricecheck_price_feed::{AggregatorConfig, PriceAggregator};
use pricecheck_reconciler::{ReconciliationEngine, Reconciler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting pricecheck v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let monitor = load_settings()?;
    info!(
        "Push feed {} ({} pairs), stream feed {}",
        monitor.push.ws_url,
        monitor.push.pairs.len(),
        monitor.stream.base_url
    );

    let mut aggregator = PriceAggregator::new(AggregatorConfig {
        monitor,
        ..Default::default()
    });
    let updates_rx = aggregator
        .take_update_receiver()
        .ok_or_else(|| anyhow::anyhow!("update receiver already taken"))?;
    let pass_trigger = aggregator.pass_trigger();

    let engine = ReconciliationEngine::new(aggregator.push_table(), aggregator.stream_table());
    let mut reconciler = Reconciler::new(engine);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let reconciler_handle = tokio::spawn(async move {
        reconciler.run(updates_rx, pass_trigger, shutdown_rx).await;
        reconciler.stats()
    });

    aggregator.start().await?;
    info!("Feeds started, press Ctrl+C to shutdown");

    wait_for_shutdown().await;

    aggregator.stop().await;
    let _ = shutdown_tx.send(());

    match reconciler_handle.await {
        Ok(stats) => info!(
            "Reconciler finished: {} push batches, {} stream batches, {} passes, {} records, {} misses",
            stats.batches(FeedSource::Push),
            stats.batches(FeedSource::Stream),
            stats.passes,
            stats.records,
            stats.misses
        ),
        Err(e) => error!("Reconciler task failed: {}", e),
    }

    let stats = aggregator.stats();
    info!(
        "Final tables: push {} pairs / {} updates, stream {} pairs / {} updates",
        stats.push.pair_count,
        stats.push.update_count,
        stats.stream.pair_count,
        stats.stream.update_count
    );
    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
