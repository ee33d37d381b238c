//! Reconciliation engine

use std::sync::Arc;

use pricecheck_core::{CanonicalSymbol, ConsistencyRecord, ReconciliationMiss};
use pricecheck_price_feed::PriceTable;

/// `((push - stream) * 100) / push`, or `None` when the push price cannot divide.
pub fn delta_percent(push_price: f64, stream_price: f64) -> Option<f64> {
    if push_price == 0.0 || !push_price.is_finite() || !stream_price.is_finite() {
        return None;
    }
    Some(((push_price - stream_price) * 100.0) / push_price)
}

/// Output of one full pass over the push table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPass {
    pub records: Vec<ConsistencyRecord>,
    pub misses: Vec<ReconciliationMiss>,
}

impl ReconciliationPass {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.misses.is_empty()
    }
}

/// Reads both latest-price tables; never writes either.
pub struct ReconciliationEngine {
    push: Arc<PriceTable>,
    stream: Arc<PriceTable>,
}

impl ReconciliationEngine {
    pub fn new(push: Arc<PriceTable>, stream: Arc<PriceTable>) -> Self {
        Self { push, stream }
    }

    /// Compare one push price against the latest stream price for its pair.
    pub fn on_push_update(
        &self,
        pair: &CanonicalSymbol,
        push_price: f64,
    ) -> Result<ConsistencyRecord, ReconciliationMiss> {
        let stream_price = self
            .stream
            .price(pair)
            .ok_or_else(|| ReconciliationMiss::NoCounterpart(pair.clone()))?;

        if !stream_price.is_finite() {
            return Err(ReconciliationMiss::NonFiniteStreamPrice {
                pair: pair.clone(),
                price: stream_price,
            });
        }

        let delta = delta_percent(push_price, stream_price).ok_or_else(|| {
            ReconciliationMiss::ZeroPushPrice {
                pair: pair.clone(),
                price: push_price,
            }
        })?;

        Ok(ConsistencyRecord {
            pair: pair.clone(),
            price_push: push_price,
            price_stream: stream_price,
            delta_percent: delta,
        })
    }

    /// Re-evaluate every pair in the push table against the current stream table.
    pub fn reconcile(&self) -> ReconciliationPass {
        let mut pass = ReconciliationPass::default();

        for (pair, entry) in self.push.snapshot() {
            match self.on_push_update(&pair, entry.price) {
                Ok(record) => pass.records.push(record),
                Err(miss) => pass.misses.push(miss),
            }
        }

        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricecheck_core::{FeedSource, PriceObservation};

    fn tables() -> (Arc<PriceTable>, Arc<PriceTable>) {
        (
            Arc::new(PriceTable::new(FeedSource::Push)),
            Arc::new(PriceTable::new(FeedSource::Stream)),
        )
    }

    fn pair(base: &str) -> CanonicalSymbol {
        CanonicalSymbol::from_parts(base, "USD")
    }

    fn put(table: &PriceTable, base: &str, price: f64) {
        table.upsert(&PriceObservation::new(pair(base), price, table.source()));
    }

    #[test]
    fn test_delta_percent() {
        assert_eq!(delta_percent(100.0, 99.0), Some(1.0));
        assert_eq!(delta_percent(50000.0, 50500.0), Some(-1.0));
        assert_eq!(delta_percent(0.0, 99.0), None);
        assert_eq!(delta_percent(f64::NAN, 99.0), None);
        assert_eq!(delta_percent(100.0, f64::INFINITY), None);
    }

    #[test]
    fn test_on_push_update_with_counterpart() {
        let (push, stream) = tables();
        put(&stream, "BTC", 99.0);
        let engine = ReconciliationEngine::new(push, stream);

        let record = engine.on_push_update(&pair("BTC"), 100.0).unwrap();
        assert_eq!(record.price_stream, 99.0);
        assert_eq!(format!("{:.2}", record.delta_percent), "1.00");
    }

    #[test]
    fn test_missing_counterpart_reported() {
        let (push, stream) = tables();
        let engine = ReconciliationEngine::new(push, stream);

        assert_eq!(
            engine.on_push_update(&pair("ETH"), 3000.0),
            Err(ReconciliationMiss::NoCounterpart(pair("ETH")))
        );
    }

    #[test]
    fn test_zero_push_price_never_divides() {
        let (push, stream) = tables();
        put(&stream, "BTC", 99.0);
        let engine = ReconciliationEngine::new(push, stream);

        assert!(matches!(
            engine.on_push_update(&pair("BTC"), 0.0),
            Err(ReconciliationMiss::ZeroPushPrice { .. })
        ));
    }

    #[test]
    fn test_non_finite_stream_price_blamed_on_stream() {
        let (push, stream) = tables();
        put(&stream, "BTC", f64::INFINITY);
        let engine = ReconciliationEngine::new(push, stream);

        let miss = engine.on_push_update(&pair("BTC"), 100.0).unwrap_err();
        assert!(matches!(
            miss,
            ReconciliationMiss::NonFiniteStreamPrice { price, .. } if price == f64::INFINITY
        ));
        assert_eq!(miss.to_string(), "stream price for BTC/USD is inf, delta undefined");
    }

    #[test]
    fn test_pass_covers_whole_push_table() {
        let (push, stream) = tables();
        put(&push, "BTC", 100.0);
        put(&push, "ETH", 200.0);
        put(&push, "SOL", 0.0);
        put(&stream, "BTC", 99.0);
        put(&stream, "SOL", 1.0);
        let engine = ReconciliationEngine::new(Arc::clone(&push), Arc::clone(&stream));

        let pass = engine.reconcile();
        assert_eq!(pass.records.len(), 1);
        assert_eq!(pass.records[0].pair, pair("BTC"));
        assert_eq!(pass.misses.len(), 2);
        assert_eq!(pass.misses[0].pair(), &pair("ETH"));
        assert_eq!(pass.misses[1].pair(), &pair("SOL"));

        // a later stream price for ETH is picked up without a new ETH push
        put(&stream, "ETH", 202.0);
        put(&push, "BTC", 101.0);
        let pass = engine.reconcile();
        assert_eq!(pass.records.len(), 2);
        assert_eq!(pass.records[1].pair, pair("ETH"));
        assert!((pass.records[1].delta_percent + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tables() {
        let (push, stream) = tables();
        let engine = ReconciliationEngine::new(push, stream);
        assert!(engine.reconcile().is_empty());
    }
}
