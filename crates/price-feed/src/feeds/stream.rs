//! SSE stream feed client

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use pricecheck_core::{
    stream_feed_ids, ConnectionState, FeedError, FeedResult, FeedSource, PriceObservation,
    StreamFeedConfig,
};

use super::{notify, PriceFeed, PriceUpdate, StateCell};
use crate::frame::{data_payload, FrameAssembler};
use crate::messages::parse_stream_update;
use crate::state::PriceTable;
use crate::stats::FeedStats;
use crate::transport::StreamConnector;

#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Completed,
    ConsumerGone,
}

/// Build the stream URL with one `ids[]=<hex>` parameter per tracked feed.
pub fn stream_url(base: &str, feed_ids: &[String]) -> String {
    let query = feed_ids
        .iter()
        .map(|id| format!("ids[]={id}"))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

pub struct StreamFeed {
    config: StreamFeedConfig,
    connector: Arc<dyn StreamConnector>,
    url: String,
    table: Arc<PriceTable>,
    state: StateCell,
    stats: FeedStats,
}

impl StreamFeed {
    /// Stream feed over every identifier in the static pair table
    pub fn new(
        config: StreamFeedConfig,
        connector: Arc<dyn StreamConnector>,
        table: Arc<PriceTable>,
        stats_interval: u64,
    ) -> Self {
        let url = stream_url(&config.base_url, &stream_feed_ids());
        Self {
            config,
            connector,
            url,
            table,
            state: StateCell::new(),
            stats: FeedStats::new(stats_interval),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect_and_read(
        &mut self,
        updates_tx: &mpsc::Sender<PriceUpdate>,
    ) -> FeedResult<StreamEnd> {
        info!("Opening stream feed at {}", self.config.base_url);
        let mut chunks = self.connector.open(&self.url).await?;
        self.state.set(FeedSource::Stream, ConnectionState::Connected, updates_tx);

        let idle = self.config.read_idle_timeout();
        let mut assembler = FrameAssembler::new();

        loop {
            let next = tokio::time::timeout(idle, chunks.next())
                .await
                .map_err(|_| FeedError::Timeout(idle))?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            for line in assembler.feed(&chunk) {
                let Some(payload) = data_payload(&line) else {
                    continue;
                };
                let started = Instant::now();

                match self.handle_payload(payload) {
                    Ok(observations) if !observations.is_empty() => {
                        if !notify(updates_tx, PriceUpdate::StreamBatch(observations)) {
                            return Ok(StreamEnd::ConsumerGone);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping stream event: {}", e),
                }

                if let Some(summary) = self.stats.record(started.elapsed()) {
                    info!(feed = "stream", "{}", summary);
                }
            }
        }

        let discarded = assembler.finish();
        if discarded > 0 {
            debug!("Discarded {} bytes of unterminated stream data", discarded);
        }
        Ok(StreamEnd::Completed)
    }

    /// Decode one `data:` payload and write tracked prices into the stream table.
    pub fn handle_payload(&self, payload: &str) -> FeedResult<Vec<PriceObservation>> {
        let update = parse_stream_update(payload)?;

        let mut observations = Vec::with_capacity(update.parsed.len());
        for entry in &update.parsed {
            let Some((pair, price)) = entry.decode() else {
                trace!("Untracked stream feed id {}", entry.id);
                continue;
            };
            let observation = PriceObservation::new(pair, price, FeedSource::Stream);
            self.table.upsert(&observation);
            observations.push(observation);
        }
        Ok(observations)
    }
}

#[async_trait]
impl PriceFeed for StreamFeed {
    fn source(&self) -> FeedSource {
        FeedSource::Stream
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn table(&self) -> Arc<PriceTable> {
        Arc::clone(&self.table)
    }

    async fn run(&mut self, updates_tx: mpsc::Sender<PriceUpdate>) {
        loop {
            self.state.set(FeedSource::Stream, ConnectionState::Connecting, &updates_tx);
            let outcome = self.connect_and_read(&updates_tx).await;
            self.state.set(FeedSource::Stream, ConnectionState::Disconnected, &updates_tx);

            match outcome {
                Ok(StreamEnd::ConsumerGone) => {
                    debug!("Updates channel closed");
                    break;
                }
                Ok(StreamEnd::Completed) => info!("Stream feed ended"),
                Err(e) => error!("Stream feed error: {}", e),
            }

            if !self.config.reconnect_on_end {
                info!("Stream feed stopped, reconnection disabled");
                break;
            }
            if updates_tx.is_closed() {
                break;
            }

            warn!("Reconnecting stream feed in {:?}", self.config.reconnect_delay());
            tokio::time::sleep(self.config.reconnect_delay()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChunkStream;
    use futures_util::stream;
    use parking_lot::Mutex;
    use pricecheck_core::CanonicalSymbol;
    use std::collections::VecDeque;
    use std::time::Duration;

    const BTC_ID: &str = "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";
    const ETH_ID: &str = "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

    /// Each script is one response body; a `None` script is a body that never
    /// yields. Once scripts run out, `open` fails.
    struct ScriptedStreams {
        scripts: Mutex<VecDeque<Option<Vec<Vec<u8>>>>>,
        opened: mpsc::UnboundedSender<tokio::time::Instant>,
    }

    #[async_trait]
    impl StreamConnector for ScriptedStreams {
        async fn open(&self, _url: &str) -> FeedResult<ChunkStream> {
            let _ = self.opened.send(tokio::time::Instant::now());
            match self.scripts.lock().pop_front() {
                Some(Some(chunks)) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
                Some(None) => Ok(stream::pending().boxed()),
                None => Err(FeedError::Transport("no response body".into())),
            }
        }
    }

    fn scripted(
        scripts: Vec<Option<Vec<Vec<u8>>>>,
        reconnect_on_end: bool,
    ) -> (StreamFeed, mpsc::UnboundedReceiver<tokio::time::Instant>) {
        let (opened, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(ScriptedStreams {
            scripts: Mutex::new(scripts.into()),
            opened,
        });
        let config = StreamFeedConfig {
            reconnect_on_end,
            ..StreamFeedConfig::default()
        };
        let feed = StreamFeed::new(
            config,
            connector,
            Arc::new(PriceTable::new(FeedSource::Stream)),
            1_000,
        );
        (feed, rx)
    }

    fn event(id: &str, price: i64, expo: i32) -> String {
        format!(
            "data:{{\"parsed\":[{{\"id\":\"{id}\",\"price\":{{\"price\":\"{price}\",\"conf\":\"1\",\"expo\":{expo},\"publish_time\":1}}}}]}}\n\n"
        )
    }

    #[test]
    fn test_stream_url_lists_every_id() {
        let url = stream_url("https://example.test/stream", &[BTC_ID.into(), ETH_ID.into()]);
        assert_eq!(
            url,
            format!("https://example.test/stream?ids[]={BTC_ID}&ids[]={ETH_ID}")
        );
        assert!(stream_url("https://x/s?parsed=true", &[BTC_ID.into()]).contains("?parsed=true&ids[]="));
    }

    #[test]
    fn test_default_url_tracks_whole_table() {
        let (feed, _opened) = scripted(vec![], false);
        assert_eq!(feed.url().matches("ids[]=").count(), 29);
    }

    #[tokio::test]
    async fn test_split_events_update_table() {
        let body = format!(
            "event: price_update\n{}{}",
            event(BTC_ID, 5_050_000_000_000, -8),
            event(ETH_ID, 300_012, -2)
        )
        .into_bytes();
        let (head, tail) = body.split_at(37);
        let chunks = vec![head.to_vec(), tail.to_vec(), b"data: {\"parsed\":[".to_vec()];

        let (mut feed, _opened) = scripted(vec![Some(chunks)], false);
        let table = feed.table();
        let (tx, mut rx) = mpsc::channel(64);
        feed.run(tx).await;

        assert_eq!(table.price(&CanonicalSymbol::from_parts("BTC", "USD")), Some(50500.0));
        assert_eq!(table.price(&CanonicalSymbol::from_parts("ETH", "USD")), Some(3000.12));

        let mut batches = 0;
        while let Ok(update) = rx.try_recv() {
            if matches!(update, PriceUpdate::StreamBatch(_)) {
                batches += 1;
            }
        }
        assert_eq!(batches, 2);
        assert_eq!(feed.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_event_skipped() {
        let body = format!("data: {{not json}}\n{}", event(BTC_ID, 42, 0)).into_bytes();
        let (mut feed, _opened) = scripted(vec![Some(vec![body])], false);
        let table = feed.table();
        let (tx, _rx) = mpsc::channel(64);
        feed.run(tx).await;

        assert_eq!(table.price(&CanonicalSymbol::from_parts("BTC", "USD")), Some(42.0));
    }

    #[test]
    fn test_untracked_ids_dropped() {
        let (feed, _opened) = scripted(vec![], false);
        let unknown = "ab".repeat(32);
        let payload = event(&unknown, 1, 0);
        let observations = feed
            .handle_payload(data_payload(payload.lines().next().unwrap()).unwrap())
            .unwrap();

        assert!(observations.is_empty());
        assert!(feed.table().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_stream_end() {
        let (mut feed, mut opened) = scripted(vec![Some(vec![]), None], true);
        let (tx, _rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { feed.run(tx).await });

        let first = opened.recv().await.unwrap();
        let second = opened.recv().await.unwrap();
        assert!(second - first >= Duration::from_secs(5));

        // second body never yields: the idle timeout ends it and a third open follows
        let third = opened.recv().await.unwrap();
        assert!(third - second >= Duration::from_secs(35));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_reports_timeout() {
        let (mut feed, _opened) = scripted(vec![None], false);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = feed.connect_and_read(&tx).await;
        assert!(matches!(outcome, Err(FeedError::Timeout(idle)) if idle == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_session() {
        let (mut feed, mut opened) = scripted(vec![None], false);
        let (tx, _rx) = mpsc::channel(64);

        let started = tokio::time::Instant::now();
        feed.run(tx).await;

        assert!(opened.recv().await.is_some());
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(opened.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_open_failure_without_reconnect_terminates() {
        let (mut feed, _opened) = scripted(vec![], false);
        let (tx, _rx) = mpsc::channel(64);
        feed.run(tx).await;
        assert_eq!(feed.state(), ConnectionState::Disconnected);
    }
}
