//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CanonicalSymbol, CoreError, CoreResult};

pub const DEFAULT_PUSH_WS_URL: &str = "wss://ws.dev.pragma.build/node/v1/data/subscribe";
pub const DEFAULT_STREAM_BASE_URL: &str = "https://hermes.pyth.network/v2/updates/price/stream";

/// Push feed (subscription socket) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushFeedConfig {
    pub ws_url: String,
    pub pairs: Vec<String>,
    pub reconnect_delay_ms: u64,
}

impl Default for PushFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_PUSH_WS_URL.to_string(),
            pairs: vec![
                "BTC/USD".to_string(),
                "ETH/USD".to_string(),
                "SOL/USD".to_string(),
                "BNB/USD".to_string(),
            ],
            reconnect_delay_ms: 5_000,
        }
    }
}

impl PushFeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Stream feed (SSE) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamFeedConfig {
    pub base_url: String,
    pub reconnect_delay_ms: u64,
    pub read_idle_timeout_ms: u64,
    /// Reconnect when the server ends the stream instead of stopping
    pub reconnect_on_end: bool,
}

impl Default for StreamFeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            reconnect_delay_ms: 5_000,
            read_idle_timeout_ms: 30_000,
            reconnect_on_end: true,
        }
    }
}

impl StreamFeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn read_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.read_idle_timeout_ms)
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub push: PushFeedConfig,
    pub stream: StreamFeedConfig,
    /// Log a throughput summary every N processed messages per feed
    pub stats_interval: u64,
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            push: PushFeedConfig::default(),
            stream: StreamFeedConfig::default(),
            stats_interval: 1_000,
            channel_capacity: 1_024,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.push.pairs.is_empty() {
            return Err(CoreError::InvalidConfig("push.pairs must not be empty".into()));
        }
        if let Some(bad) = self
            .push
            .pairs
            .iter()
            .find(|p| CanonicalSymbol::parse(p).is_none())
        {
            return Err(CoreError::InvalidConfig(format!(
                "push.pairs entry {bad:?} is not BASE/QUOTE"
            )));
        }
        if self.push.reconnect_delay_ms == 0 || self.stream.reconnect_delay_ms == 0 {
            return Err(CoreError::InvalidConfig("reconnect delays must be non-zero".into()));
        }
        if self.stream.read_idle_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "stream.read_idle_timeout_ms must be non-zero".into(),
            ));
        }
        if self.stats_interval == 0 {
            return Err(CoreError::InvalidConfig("stats_interval must be non-zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(CoreError::InvalidConfig("channel_capacity must be non-zero".into()));
        }
        Ok(())
    }
}
