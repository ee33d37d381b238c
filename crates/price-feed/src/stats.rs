//! Per-feed throughput accounting and push feed health counters

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use pricecheck_core::{CanonicalSymbol, PriceObservation};

/// Inter-arrival samples kept for latency percentiles
pub const LATENCY_WINDOW: usize = 4_096;

/// Running message count and processing time for one feed
#[derive(Debug)]
pub struct FeedStats {
    interval: u64,
    started_at: Instant,
    message_count: u64,
    total_processing: Duration,
}

impl FeedStats {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            started_at: Instant::now(),
            message_count: 0,
            total_processing: Duration::ZERO,
        }
    }

    /// Record one processed message; every `interval` messages returns a summary.
    pub fn record(&mut self, processing: Duration) -> Option<ThroughputSummary> {
        self.message_count += 1;
        self.total_processing += processing;

        (self.message_count % self.interval == 0).then(|| self.summary())
    }

    pub fn summary(&self) -> ThroughputSummary {
        let elapsed = self.started_at.elapsed();
        let secs = elapsed.as_secs_f64();
        let count = self.message_count;

        ThroughputSummary {
            message_count: count,
            elapsed,
            avg_processing_ms: if count == 0 {
                0.0
            } else {
                self.total_processing.as_secs_f64() * 1_000.0 / count as f64
            },
            messages_per_second: if secs > 0.0 { count as f64 / secs } else { 0.0 },
        }
    }
}

/// Snapshot logged every `interval` messages
#[derive(Debug, Clone, Copy)]
pub struct ThroughputSummary {
    pub message_count: u64,
    pub elapsed: Duration,
    pub avg_processing_ms: f64,
    pub messages_per_second: f64,
}

impl fmt::Display for ThroughputSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} messages in {:.2} seconds, average processing time: {:.3} ms, messages per second: {:.2}",
            self.message_count,
            self.elapsed.as_secs_f64(),
            self.avg_processing_ms,
            self.messages_per_second
        )
    }
}

/// Bounded window of gaps between consecutive message arrivals
#[derive(Debug)]
pub struct ArrivalLatency {
    last: Option<Instant>,
    samples_ms: VecDeque<f64>,
    capacity: usize,
}

impl ArrivalLatency {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            last: None,
            samples_ms: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, at: Instant) {
        if let Some(previous) = self.last.replace(at) {
            if self.samples_ms.len() == self.capacity {
                self.samples_ms.pop_front();
            }
            let gap = at.saturating_duration_since(previous);
            self.samples_ms.push_back(gap.as_secs_f64() * 1_000.0);
        }
    }

    /// `None` until two arrivals have been seen.
    pub fn metrics(&self) -> Option<LatencyMetrics> {
        if self.samples_ms.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples_ms.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(LatencyMetrics {
            samples: sorted.len(),
            mean_ms: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median_ms: percentile(&sorted, 50.0),
            q1_ms: percentile(&sorted, 25.0),
            q3_ms: percentile(&sorted, 75.0),
            p90_ms: percentile(&sorted, 90.0),
            p99_ms: percentile(&sorted, 99.0),
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyMetrics {
    pub samples: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub q1_ms: f64,
    pub q3_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

impl fmt::Display for LatencyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inter-arrival over {} samples: mean {:.2} ms, median {:.2} ms, q1 {:.2} ms, q3 {:.2} ms, p90 {:.2} ms, p99 {:.2} ms",
            self.samples,
            self.mean_ms,
            self.median_ms,
            self.q1_ms,
            self.q3_ms,
            self.p90_ms,
            self.p99_ms
        )
    }
}

/// Updates compared against a previous price, and how many repeated it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCount {
    pub total: u64,
    pub missed: u64,
}

impl SlotCount {
    pub fn missed_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.missed as f64 * 100.0 / self.total as f64
        }
    }
}

impl fmt::Display for SlotCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.2} %)", self.missed, self.total, self.missed_percent())
    }
}

/// Missed slots: updates whose price equals the previous one for the pair.
///
/// A batch counts as a globally missed slot when every pair it repeats is unchanged.
#[derive(Debug, Default)]
pub struct SlotTracker {
    last_price: HashMap<CanonicalSymbol, f64>,
    per_pair: HashMap<CanonicalSymbol, SlotCount>,
    global: SlotCount,
}

impl SlotTracker {
    pub fn record_batch(&mut self, observations: &[PriceObservation]) {
        let mut compared = false;
        let mut all_unchanged = true;

        for observation in observations {
            let Some(previous) = self.last_price.insert(observation.pair.clone(), observation.price)
            else {
                continue;
            };
            compared = true;

            let count = self.per_pair.entry(observation.pair.clone()).or_default();
            count.total += 1;
            if previous == observation.price {
                count.missed += 1;
            } else {
                all_unchanged = false;
            }
        }

        if compared {
            self.global.total += 1;
            if all_unchanged {
                self.global.missed += 1;
            }
        }
    }

    pub fn pair(&self, pair: &CanonicalSymbol) -> SlotCount {
        self.per_pair.get(pair).copied().unwrap_or_default()
    }

    pub fn global(&self) -> SlotCount {
        self.global
    }
}

impl fmt::Display for SlotTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missed slots: global {}", self.global)?;
        let mut pairs: Vec<_> = self.per_pair.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        for (pair, count) in pairs {
            write!(f, ", {} {}", pair, count)?;
        }
        Ok(())
    }
}

/// Push feed health: arrival latency, empty messages, missed slots
#[derive(Debug)]
pub struct PushFeedMetrics {
    latency: ArrivalLatency,
    slots: SlotTracker,
    empty_messages: u64,
}

impl Default for PushFeedMetrics {
    fn default() -> Self {
        Self {
            latency: ArrivalLatency::new(LATENCY_WINDOW),
            slots: SlotTracker::default(),
            empty_messages: 0,
        }
    }
}

impl PushFeedMetrics {
    pub fn record_arrival(&mut self, at: Instant) {
        self.latency.record(at);
    }

    /// A message that carried no `oracle_prices`
    pub fn record_empty(&mut self) {
        self.empty_messages += 1;
    }

    pub fn record_batch(&mut self, observations: &[PriceObservation]) {
        self.slots.record_batch(observations);
    }

    pub fn latency(&self) -> Option<LatencyMetrics> {
        self.latency.metrics()
    }

    pub fn empty_messages(&self) -> u64 {
        self.empty_messages
    }

    pub fn slots(&self) -> &SlotTracker {
        &self.slots
    }
}

impl fmt::Display for PushFeedMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.latency() {
            Some(latency) => write!(f, "{}", latency)?,
            None => f.write_str("inter-arrival: not enough samples")?,
        }
        write!(f, "; empty messages: {}; {}", self.empty_messages, self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricecheck_core::FeedSource;

    fn push_obs(base: &str, price: f64) -> PriceObservation {
        PriceObservation::new(CanonicalSymbol::from_parts(base, "USD"), price, FeedSource::Push)
    }

    #[test]
    fn test_summary_every_interval() {
        let mut stats = FeedStats::new(3);
        assert!(stats.record(Duration::from_millis(1)).is_none());
        assert!(stats.record(Duration::from_millis(2)).is_none());

        let summary = stats.record(Duration::from_millis(3)).unwrap();
        assert_eq!(summary.message_count, 3);
        assert!((summary.avg_processing_ms - 2.0).abs() < 1e-9);

        assert!(stats.record(Duration::ZERO).is_none());
    }

    #[test]
    fn test_zero_interval_clamped() {
        let mut stats = FeedStats::new(0);
        assert!(stats.record(Duration::ZERO).is_some());
    }

    #[test]
    fn test_empty_summary() {
        let summary = FeedStats::new(10).summary();
        assert_eq!(summary.message_count, 0);
        assert_eq!(summary.avg_processing_ms, 0.0);
    }

    #[test]
    fn test_latency_percentiles_interpolate() {
        let mut latency = ArrivalLatency::new(16);
        let start = Instant::now();
        assert!(latency.metrics().is_none());

        // gaps of 10, 20, 30, 40 ms
        let mut at = start;
        latency.record(at);
        for gap in [10, 20, 30, 40] {
            at += Duration::from_millis(gap);
            latency.record(at);
        }

        let metrics = latency.metrics().unwrap();
        assert_eq!(metrics.samples, 4);
        assert!((metrics.mean_ms - 25.0).abs() < 1e-6);
        assert!((metrics.median_ms - 25.0).abs() < 1e-6);
        assert!((metrics.q1_ms - 17.5).abs() < 1e-6);
        assert!((metrics.q3_ms - 32.5).abs() < 1e-6);
        assert!((metrics.p90_ms - 37.0).abs() < 1e-6);
        assert!((metrics.p99_ms - 39.7).abs() < 1e-6);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut latency = ArrivalLatency::new(2);
        let mut at = Instant::now();
        latency.record(at);
        for gap in [1_000, 5, 5] {
            at += Duration::from_millis(gap);
            latency.record(at);
        }

        let metrics = latency.metrics().unwrap();
        assert_eq!(metrics.samples, 2);
        assert!((metrics.p99_ms - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_missed_slots_per_pair_and_global() {
        let mut slots = SlotTracker::default();
        slots.record_batch(&[push_obs("BTC", 100.0), push_obs("ETH", 10.0)]);
        assert_eq!(slots.global(), SlotCount::default());

        slots.record_batch(&[push_obs("BTC", 100.0), push_obs("ETH", 11.0)]);
        slots.record_batch(&[push_obs("BTC", 100.0), push_obs("ETH", 11.0)]);

        let btc = slots.pair(&CanonicalSymbol::from_parts("BTC", "USD"));
        assert_eq!(btc, SlotCount { total: 2, missed: 2 });
        let eth = slots.pair(&CanonicalSymbol::from_parts("ETH", "USD"));
        assert_eq!(eth, SlotCount { total: 2, missed: 1 });
        assert_eq!(slots.global(), SlotCount { total: 2, missed: 1 });
        assert_eq!(
            slots.to_string(),
            "missed slots: global 1/2 (50.00 %), BTC/USD 2/2 (100.00 %), ETH/USD 1/2 (50.00 %)"
        );
    }

    #[test]
    fn test_push_metrics_summary() {
        let mut metrics = PushFeedMetrics::default();
        metrics.record_empty();
        metrics.record_arrival(Instant::now());

        assert_eq!(metrics.empty_messages(), 1);
        assert!(metrics.latency().is_none());
        assert_eq!(
            metrics.to_string(),
            "inter-arrival: not enough samples; empty messages: 1; missed slots: global 0/0 (0.00 %)"
        );
    }
}
