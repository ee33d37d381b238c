//! Dual-feed price ingestion
//!
//! Features:
//! - Push feed over a subscription WebSocket, reconnecting forever
//! - SSE stream feed with incremental line framing and an idle timeout
//! - Single-writer latest-price tables per feed
//! - Throughput summaries every N messages, plus push latency and missed-slot counts

pub mod aggregator;
pub mod feeds;
pub mod frame;
pub mod messages;
pub mod state;
pub mod stats;
pub mod transport;

pub use aggregator::{AggregatorConfig, PriceAggregator};
pub use feeds::{PassTrigger, PriceFeed, PriceUpdate, PushFeed, StreamFeed};
pub use frame::FrameAssembler;
pub use state::PriceTable;
