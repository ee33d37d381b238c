//! Core types and utilities for the cross-feed price checker
//!
//! This crate provides shared types used across all components:
//! - Canonical pair symbols and price observations
//! - Price decoders for both feed encodings
//! - Pair identifier translators
//! - Feed configuration and error types

pub mod types;
pub mod decode;
pub mod pairs;
pub mod config;
pub mod errors;

pub use types::*;
pub use decode::*;
pub use pairs::*;
pub use config::*;
pub use errors::*;
