//! Latest-price tables
//!
//! One `PriceTable` per feed source. Each table has a single writer (its feed
//! client) and any number of readers; DashMap keeps reads lock-free.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pricecheck_core::{CanonicalSymbol, FeedSource, PriceObservation};

/// Latest price for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceEntry {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

/// Last-write-wins price table for one feed
#[derive(Debug)]
pub struct PriceTable {
    source: FeedSource,
    prices: DashMap<CanonicalSymbol, PriceEntry>,

    /// Stats
    update_count: AtomicU64,
    last_update: RwLock<Option<Instant>>,
}

impl PriceTable {
    pub fn new(source: FeedSource) -> Self {
        Self {
            source,
            prices: DashMap::new(),
            update_count: AtomicU64::new(0),
            last_update: RwLock::new(None),
        }
    }

    pub fn source(&self) -> FeedSource {
        self.source
    }

    /// Upsert an observation
    pub fn upsert(&self, observation: &PriceObservation) {
        debug_assert_eq!(observation.source, self.source);

        self.prices.insert(
            observation.pair.clone(),
            PriceEntry {
                price: observation.price,
                observed_at: observation.observed_at,
            },
        );
        self.update_count.fetch_add(1, Ordering::Relaxed);
        *self.last_update.write() = Some(Instant::now());
    }

    pub fn get(&self, pair: &CanonicalSymbol) -> Option<PriceEntry> {
        self.prices.get(pair).map(|r| *r.value())
    }

    pub fn price(&self, pair: &CanonicalSymbol) -> Option<f64> {
        self.get(pair).map(|e| e.price)
    }

    /// Copy of the table, ordered by pair
    pub fn snapshot(&self) -> Vec<(CanonicalSymbol, PriceEntry)> {
        let mut entries: Vec<_> = self
            .prices
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Stats
    pub fn stats(&self) -> PriceTableStats {
        PriceTableStats {
            source: self.source,
            pair_count: self.prices.len(),
            update_count: self.update_count.load(Ordering::Relaxed),
            last_update_age: self.last_update.read().map(|t| t.elapsed()),
        }
    }
}

/// Statistics about one price table
#[derive(Debug, Clone)]
pub struct PriceTableStats {
    pub source: FeedSource,
    pub pair_count: usize,
    pub update_count: u64,
    pub last_update_age: Option<Duration>,
}
