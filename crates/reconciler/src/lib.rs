//! Cross-feed price reconciliation
//!
//! Features:
//! - Joins push and stream prices on canonical pair symbols
//! - Re-evaluates every known push pair on each push update
//! - Reports percentage deltas and pairs with no counterpart

pub mod engine;
pub mod runner;

pub use engine::{delta_percent, ReconciliationEngine, ReconciliationPass};
pub use runner::{Reconciler, ReconcilerStats};
