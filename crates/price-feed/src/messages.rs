//! Wire schemas for both feeds
//!
//! Every inbound payload is deserialized into an explicit struct; a missing or
//! mistyped field surfaces as `FeedError::Parse` instead of a silent default.

use serde::{Deserialize, Deserializer, Serialize};

use pricecheck_core::{
    decode_exponent_price, decode_fixed_point_price, push_pair_symbol, stream_pair_symbol,
    CanonicalSymbol, DecodeResult, FeedError, FeedResult,
};

/// Subscription request sent on every push connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub msg_type: String,
    pub pairs: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(pairs: Vec<String>) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            pairs,
        }
    }

    pub fn to_json(&self) -> FeedResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Push feed message envelope
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub msg_type: Option<String>,
    pub oracle_prices: Option<Vec<OraclePrice>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OraclePrice {
    pub global_asset_id: String,
    pub median_price: String,
}

impl OraclePrice {
    pub fn decode(&self) -> DecodeResult<(CanonicalSymbol, f64)> {
        let pair = push_pair_symbol(&self.global_asset_id)?;
        let price = decode_fixed_point_price(&self.median_price)?;
        Ok((pair, price))
    }
}

/// What a push text frame turned out to be
#[derive(Debug)]
pub enum PushPayload {
    Prices(Vec<OraclePrice>),
    /// Subscription acknowledgement or other control message
    Control(String),
}

pub fn parse_push_message(text: &str) -> FeedResult<PushPayload> {
    let message: PushMessage = serde_json::from_str(text)?;
    match (message.oracle_prices, message.msg_type) {
        (Some(prices), _) => Ok(PushPayload::Prices(prices)),
        (None, Some(msg_type)) => Ok(PushPayload::Control(msg_type)),
        (None, None) => Err(FeedError::Parse(
            "push message has neither oracle_prices nor msg_type".into(),
        )),
    }
}

/// SSE `data:` payload
#[derive(Debug, Clone, Deserialize)]
pub struct StreamUpdate {
    pub parsed: Vec<StreamPriceFeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamPriceFeed {
    pub id: String,
    pub price: StreamPrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamPrice {
    #[serde(deserialize_with = "int_or_string")]
    pub price: i64,
    pub expo: i32,
    #[serde(default)]
    pub publish_time: Option<i64>,
}

impl StreamPriceFeed {
    /// `None` when the feed id is not tracked.
    pub fn decode(&self) -> Option<(CanonicalSymbol, f64)> {
        let pair = stream_pair_symbol(&self.id)?;
        Some((pair.clone(), decode_exponent_price(self.price.price, self.price.expo)))
    }
}

pub fn parse_stream_update(payload: &str) -> FeedResult<StreamUpdate> {
    Ok(serde_json::from_str(payload)?)
}

/// Accept `123` or `"123"`; Hermes encodes 64-bit integers as strings.
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(v) => Ok(v),
        IntOrString::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
