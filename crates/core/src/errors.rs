//! Error types

use thiserror::Error;

use crate::CanonicalSymbol;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Price encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Fixed-point price too short: {len} digits, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("Price contains non-digit characters: {0:?}")]
    NotDigits(String),

    #[error("Number out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid short string identifier: {0}")]
    InvalidShortString(String),

    #[error("Invalid pair symbol: {0}")]
    InvalidSymbol(String),
}

/// Price feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout waiting for data after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Parse(e.to_string())
    }
}

impl From<DecodeError> for FeedError {
    fn from(e: DecodeError) -> Self {
        FeedError::Parse(e.to_string())
    }
}

/// Reasons a pair could not be compared in a reconciliation pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconciliationMiss {
    #[error("no stream price for {0}")]
    NoCounterpart(CanonicalSymbol),

    #[error("push price for {pair} is {price}, delta undefined")]
    ZeroPushPrice { pair: CanonicalSymbol, price: f64 },

    #[error("stream price for {pair} is {price}, delta undefined")]
    NonFiniteStreamPrice { pair: CanonicalSymbol, price: f64 },
}

impl ReconciliationMiss {
    pub fn pair(&self) -> &CanonicalSymbol {
        match self {
            ReconciliationMiss::NoCounterpart(pair) => pair,
            ReconciliationMiss::ZeroPushPrice { pair, .. } => pair,
            ReconciliationMiss::NonFiniteStreamPrice { pair, .. } => pair,
        }
    }
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type FeedResult<T> = Result<T, FeedError>;
