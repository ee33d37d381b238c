//! Feed aggregator - owns both price tables and runs both feed clients

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use pricecheck_core::{FeedResult, FeedSource, MonitorConfig};

use crate::feeds::{PassTrigger, PriceFeed, PriceUpdate, PushFeed, StreamFeed};
use crate::state::{PriceTable, PriceTableStats};
use crate::transport::{HttpStreamConnector, PushConnector, StreamConnector, WsConnector};

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub monitor: MonitorConfig,
    pub stats_log_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            stats_log_interval: Duration::from_secs(60),
        }
    }
}

/// Runs the push and stream feeds, each writing its own table
pub struct PriceAggregator {
    config: AggregatorConfig,
    push_table: Arc<PriceTable>,
    stream_table: Arc<PriceTable>,
    update_rx: Option<mpsc::Receiver<PriceUpdate>>,
    update_tx: mpsc::Sender<PriceUpdate>,
    pass_trigger: Arc<PassTrigger>,
    handles: Vec<JoinHandle<()>>,
    running: Arc<RwLock<bool>>,
}

impl PriceAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let (update_tx, update_rx) = mpsc::channel(config.monitor.channel_capacity.max(1));

        Self {
            config,
            push_table: Arc::new(PriceTable::new(FeedSource::Push)),
            stream_table: Arc::new(PriceTable::new(FeedSource::Stream)),
            update_rx: Some(update_rx),
            update_tx,
            pass_trigger: Arc::new(PassTrigger::new()),
            handles: vec![],
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn push_table(&self) -> Arc<PriceTable> {
        Arc::clone(&self.push_table)
    }

    pub fn stream_table(&self) -> Arc<PriceTable> {
        Arc::clone(&self.stream_table)
    }

    /// Fired once per decoded push batch; drives reconciliation passes
    pub fn pass_trigger(&self) -> Arc<PassTrigger> {
        Arc::clone(&self.pass_trigger)
    }

    /// Get update receiver (can only be taken once)
    pub fn take_update_receiver(&mut self) -> Option<mpsc::Receiver<PriceUpdate>> {
        self.update_rx.take()
    }

    /// Start both feeds over the production transports
    pub async fn start(&mut self) -> FeedResult<()> {
        let stream_connector = HttpStreamConnector::new()?;
        self.start_with(Arc::new(WsConnector), Arc::new(stream_connector))
            .await;
        Ok(())
    }

    /// Start both feeds over the given transports
    pub async fn start_with(
        &mut self,
        push_connector: Arc<dyn PushConnector>,
        stream_connector: Arc<dyn StreamConnector>,
    ) {
        info!("Starting price aggregator");
        *self.running.write().await = true;

        let monitor = &self.config.monitor;
        let feeds: Vec<Box<dyn PriceFeed>> = vec![
            Box::new(PushFeed::new(
                monitor.push.clone(),
                push_connector,
                Arc::clone(&self.push_table),
                Arc::clone(&self.pass_trigger),
                monitor.stats_interval,
            )),
            Box::new(StreamFeed::new(
                monitor.stream.clone(),
                stream_connector,
                Arc::clone(&self.stream_table),
                monitor.stats_interval,
            )),
        ];

        for mut feed in feeds {
            let source = feed.source();
            let tx = self.update_tx.clone();
            let handle = tokio::spawn(async move {
                feed.run(tx).await;
            });
            self.handles.push(handle);
            info!("Started {} feed", source);
        }

        // Periodic table summary
        let push_table = Arc::clone(&self.push_table);
        let stream_table = Arc::clone(&self.stream_table);
        let log_interval = self.config.stats_log_interval;
        let running = Arc::clone(&self.running);

        let stats_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(log_interval);
            interval.tick().await;

            loop {
                interval.tick().await;

                if !*running.read().await {
                    break;
                }

                for stats in [push_table.stats(), stream_table.stats()] {
                    info!(
                        "{} table: {} pairs, {} updates, last update {:?} ago",
                        stats.source, stats.pair_count, stats.update_count, stats.last_update_age
                    );
                }
            }
        });

        self.handles.push(stats_handle);
    }

    /// Stop all feeds
    pub async fn stop(&mut self) {
        info!("Stopping price aggregator");
        *self.running.write().await = false;

        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Check if running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get statistics
    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            task_count: self.handles.len(),
            push: self.push_table.stats(),
            stream: self.stream_table.stats(),
        }
    }
}

/// Aggregator statistics
#[derive(Debug, Clone)]
pub struct AggregatorStats {
    pub task_count: usize,
    pub push: PriceTableStats,
    pub stream: PriceTableStats,
}
