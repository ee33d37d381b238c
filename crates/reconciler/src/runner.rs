//! Reconciler task: turns feed notifications into consistency reports

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use pricecheck_core::{ConsistencyRecord, FeedSource};
use pricecheck_price_feed::{PassTrigger, PriceUpdate};

use crate::engine::{ReconciliationEngine, ReconciliationPass};

pub struct Reconciler {
    engine: ReconciliationEngine,
    record_tx: Option<mpsc::Sender<ConsistencyRecord>>,
    stats: ReconcilerStats,
}

impl Reconciler {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self {
            engine,
            record_tx: None,
            stats: ReconcilerStats::default(),
        }
    }

    /// Also forward every record to `record_tx`
    pub fn with_record_sink(mut self, record_tx: mpsc::Sender<ConsistencyRecord>) -> Self {
        self.record_tx = Some(record_tx);
        self
    }

    /// Run a pass per push trigger and consume feed notifications until the
    /// channel closes or shutdown fires.
    pub async fn run(
        &mut self,
        mut updates_rx: mpsc::Receiver<PriceUpdate>,
        pass_trigger: Arc<PassTrigger>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("Starting reconciler");

        loop {
            tokio::select! {
                batches = pass_trigger.wait() => {
                    self.on_push_batches(batches).await;
                }
                update = updates_rx.recv() => {
                    let Some(update) = update else {
                        info!("All feeds stopped, reconciler exiting");
                        break;
                    };
                    self.handle_update(update);
                }
                _ = &mut shutdown => {
                    info!("Reconciler shutdown requested");
                    break;
                }
            }
        }
    }

    /// One full pass for `batches` coalesced push batches.
    pub async fn on_push_batches(&mut self, batches: u64) -> ReconciliationPass {
        self.stats.push_batches += batches;
        debug!("{} push batches since the last pass", batches);
        self.reconcile().await
    }

    /// Apply one best-effort notification from either feed.
    pub fn handle_update(&mut self, update: PriceUpdate) {
        match update {
            PriceUpdate::StreamBatch(observations) => {
                self.stats.stream_batches += 1;
                debug!("Stream batch of {} prices", observations.len());
            }
            PriceUpdate::Connection { source, state } => {
                info!("{} feed {}", source, state);
            }
        }
    }

    async fn reconcile(&mut self) -> ReconciliationPass {
        let started = Instant::now();
        let pass = self.engine.reconcile();

        for record in &pass.records {
            info!("{}", record);
        }
        for miss in &pass.misses {
            warn!("{}", miss);
        }
        debug!(
            "Reconciled {} pairs ({} misses) in {:?}",
            pass.records.len(),
            pass.misses.len(),
            started.elapsed()
        );

        self.stats.passes += 1;
        self.stats.records += pass.records.len() as u64;
        self.stats.misses += pass.misses.len() as u64;

        if let Some(tx) = self.record_tx.take() {
            let mut open = true;
            for record in &pass.records {
                if tx.send(record.clone()).await.is_err() {
                    debug!("Record sink closed");
                    open = false;
                    break;
                }
            }
            if open {
                self.record_tx = Some(tx);
            }
        }

        pass
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.stats.clone()
    }
}

/// Reconciler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub push_batches: u64,
    pub stream_batches: u64,
    pub passes: u64,
    pub records: u64,
    pub misses: u64,
}

impl ReconcilerStats {
    pub fn batches(&self, source: FeedSource) -> u64 {
        match source {
            FeedSource::Push => self.push_batches,
            FeedSource::Stream => self.stream_batches,
        }
    }
}
