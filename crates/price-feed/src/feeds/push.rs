//! Push feed client
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`, forever: every
//! close or error is followed by the fixed reconnect delay and a fresh
//! connection that re-sends the subscription. Every decoded batch fires the
//! reconciler's [`PassTrigger`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pricecheck_core::{
    ConnectionState, FeedResult, FeedSource, PriceObservation, PushFeedConfig,
};

use super::{PassTrigger, PriceFeed, PriceUpdate, StateCell};
use crate::messages::{parse_push_message, PushPayload, SubscribeRequest};
use crate::state::PriceTable;
use crate::stats::{FeedStats, PushFeedMetrics};
use crate::transport::PushConnector;

/// Why a session ended without a transport error
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    ConsumerGone,
}

pub struct PushFeed {
    config: PushFeedConfig,
    connector: Arc<dyn PushConnector>,
    table: Arc<PriceTable>,
    trigger: Arc<PassTrigger>,
    state: StateCell,
    stats: FeedStats,
    metrics: PushFeedMetrics,
    attempts: u64,
}

impl PushFeed {
    pub fn new(
        config: PushFeedConfig,
        connector: Arc<dyn PushConnector>,
        table: Arc<PriceTable>,
        trigger: Arc<PassTrigger>,
        stats_interval: u64,
    ) -> Self {
        Self {
            config,
            connector,
            table,
            trigger,
            state: StateCell::new(),
            stats: FeedStats::new(stats_interval),
            metrics: PushFeedMetrics::default(),
            attempts: 0,
        }
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn metrics(&self) -> &PushFeedMetrics {
        &self.metrics
    }

    async fn connect_and_listen(
        &mut self,
        updates_tx: &mpsc::Sender<PriceUpdate>,
    ) -> FeedResult<SessionEnd> {
        self.attempts += 1;
        info!("Connecting push feed to {}", self.config.ws_url);

        let mut session = self.connector.connect(&self.config.ws_url).await?;
        self.state.set(FeedSource::Push, ConnectionState::Connected, updates_tx);
        info!("Push feed connection established");

        let subscribe = SubscribeRequest::new(self.config.pairs.clone()).to_json()?;
        session.send_text(subscribe).await?;
        info!("Subscribed to {} pairs", self.config.pairs.len());

        while let Some(text) = session.next_text().await? {
            let started = Instant::now();
            self.metrics.record_arrival(started);

            match self.decode_message(&text) {
                Ok(Some(observations)) if !observations.is_empty() => {
                    self.metrics.record_batch(&observations);
                    self.trigger.fire();
                }
                Ok(Some(_)) => {}
                Ok(None) => self.metrics.record_empty(),
                Err(e) => warn!("Skipping push message: {}", e),
            }

            if let Some(summary) = self.stats.record(started.elapsed()) {
                info!(feed = "push", "{}", summary);
                info!(feed = "push", "{}", self.metrics);
            }

            if updates_tx.is_closed() {
                return Ok(SessionEnd::ConsumerGone);
            }
        }

        Ok(SessionEnd::Closed)
    }

    /// Decode one text frame and write its prices into the push table.
    ///
    /// A bad entry is skipped without discarding the rest of the batch.
    pub fn handle_message(&self, text: &str) -> FeedResult<Vec<PriceObservation>> {
        Ok(self.decode_message(text)?.unwrap_or_default())
    }

    /// `None` for a message without `oracle_prices`.
    fn decode_message(&self, text: &str) -> FeedResult<Option<Vec<PriceObservation>>> {
        let prices = match parse_push_message(text)? {
            PushPayload::Prices(prices) => prices,
            PushPayload::Control(msg_type) => {
                debug!("Push control message: {}", msg_type);
                return Ok(None);
            }
        };

        let mut observations = Vec::with_capacity(prices.len());
        for entry in &prices {
            match entry.decode() {
                Ok((pair, price)) => {
                    let observation = PriceObservation::new(pair, price, FeedSource::Push);
                    self.table.upsert(&observation);
                    observations.push(observation);
                }
                Err(e) => warn!(
                    "Skipping push price {}={}: {}",
                    entry.global_asset_id, entry.median_price, e
                ),
            }
        }
        Ok(Some(observations))
    }
}

#[async_trait]
impl PriceFeed for PushFeed {
    fn source(&self) -> FeedSource {
        FeedSource::Push
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn table(&self) -> Arc<PriceTable> {
        Arc::clone(&self.table)
    }

    async fn run(&mut self, updates_tx: mpsc::Sender<PriceUpdate>) {
        loop {
            self.state.set(FeedSource::Push, ConnectionState::Connecting, &updates_tx);

            match self.connect_and_listen(&updates_tx).await {
                Ok(SessionEnd::Closed) => info!("Push feed connection closed"),
                Ok(SessionEnd::ConsumerGone) => debug!("Updates channel closed"),
                Err(e) => error!("Push feed error: {}", e),
            }

            self.state.set(FeedSource::Push, ConnectionState::Disconnected, &updates_tx);

            if updates_tx.is_closed() {
                info!("Push feed stopping, no consumer left");
                break;
            }

            warn!(
                "Reconnecting push feed in {:?} (attempt {})",
                self.config.reconnect_delay(),
                self.attempts + 1
            );
            tokio::time::sleep(self.config.reconnect_delay()).await;
        }
    }
}
