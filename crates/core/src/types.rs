//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote assets recognised when splitting a concatenated symbol like `BTCUSD`.
/// Longer suffixes come first so `USDT` wins over `USD`.
const KNOWN_QUOTES: &[&str] = &["USDT", "USDC", "USD", "EUR", "BTC", "ETH"];

/// The two price feeds being cross-checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// Subscription feed over a duplex socket
    Push,
    /// Server-sent-event feed over HTTP
    Stream,
}

impl FeedSource {
    pub fn name(&self) -> &'static str {
        match self {
            FeedSource::Push => "push",
            FeedSource::Stream => "stream",
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Join key for one asset pair, always `BASE/QUOTE` in upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalSymbol(String);

impl CanonicalSymbol {
    pub fn from_parts(base: &str, quote: &str) -> Self {
        Self(format!(
            "{}/{}",
            base.trim().to_ascii_uppercase(),
            quote.trim().to_ascii_uppercase()
        ))
    }

    /// Parse a slashed pair such as `btc/usd` or `ETH/USD`.
    ///
    /// Anything after a `:` (e.g. `ETH/USD:MARK`) is kept as part of the
    /// quote so distinct instruments never collapse onto the spot pair.
    pub fn parse(raw: &str) -> Option<Self> {
        let (base, quote) = raw.trim().split_once('/')?;
        if base.trim().is_empty() || quote.trim().is_empty() {
            return None;
        }
        Some(Self::from_parts(base, quote))
    }

    /// Split a concatenated symbol such as `BTCUSD` on a known quote suffix.
    pub fn from_concatenated(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        KNOWN_QUOTES.iter().find_map(|quote| {
            upper
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| Self::from_parts(base, quote))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded price from one feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub pair: CanonicalSymbol,
    pub price: f64,
    pub source: FeedSource,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(pair: CanonicalSymbol, price: f64, source: FeedSource) -> Self {
        Self {
            pair,
            price,
            source,
            observed_at: Utc::now(),
        }
    }
}

/// Result of comparing one pair across both feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyRecord {
    pub pair: CanonicalSymbol,
    pub price_push: f64,
    pub price_stream: f64,
    pub delta_percent: f64,
}

impl fmt::Display for ConsistencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => push price: {}, stream price: {}, delta is {:.2} %",
            self.pair, self.price_push, self.price_stream, self.delta_percent
        )
    }
}

/// Lifecycle of a reconnecting feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}
