//! Feed clients for the push socket and the SSE stream

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::debug;

use pricecheck_core::{ConnectionState, FeedSource, PriceObservation};

use crate::state::PriceTable;

pub mod push;
pub mod stream;

pub use push::PushFeed;
pub use stream::{stream_url, StreamFeed};

/// Best-effort notification sent to the reconciler.
///
/// Push batches never travel here: they fire the [`PassTrigger`] instead, so a
/// channel full of stream traffic cannot swallow a reconciliation pass.
#[derive(Debug, Clone)]
pub enum PriceUpdate {
    StreamBatch(Vec<PriceObservation>),
    Connection {
        source: FeedSource,
        state: ConnectionState,
    },
}

/// Coalescing "push table changed" signal.
///
/// Any number of fires before the reconciler wakes collapse into one pass;
/// a fire is never lost, even while nobody is waiting.
#[derive(Debug, Default)]
pub struct PassTrigger {
    pending: AtomicU64,
    notify: Notify,
}

impl PassTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one push batch and wake the reconciler.
    pub fn fire(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_one();
    }

    /// Batches fired since the last `take`/`wait`, resetting the count.
    pub fn take(&self) -> u64 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    /// Wait until at least one batch has fired; returns the coalesced count.
    pub async fn wait(&self) -> u64 {
        loop {
            let fired = self.take();
            if fired > 0 {
                return fired;
            }
            self.notify.notified().await;
        }
    }
}

/// Common surface of both feed clients
#[async_trait]
pub trait PriceFeed: Send {
    fn source(&self) -> FeedSource;
    fn state(&self) -> ConnectionState;
    fn table(&self) -> Arc<PriceTable>;

    /// Run until the updates channel closes (or forever, for reconnecting feeds).
    async fn run(&mut self, updates_tx: mpsc::Sender<PriceUpdate>);
}

/// Shared, observable connection state
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<RwLock<ConnectionState>>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(RwLock::new(ConnectionState::Disconnected)))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.0.read()
    }

    pub(crate) fn set(
        &self,
        source: FeedSource,
        state: ConnectionState,
        updates_tx: &mpsc::Sender<PriceUpdate>,
    ) {
        *self.0.write() = state;
        debug!("{} feed {}", source, state);
        notify(updates_tx, PriceUpdate::Connection { source, state });
    }
}

/// Hand an update to the reconciler without waiting.
///
/// Returns `false` once the receiver is gone. A full channel drops the
/// notification; the tables already hold the data and the next pass reads them.
pub(crate) fn notify(updates_tx: &mpsc::Sender<PriceUpdate>, update: PriceUpdate) -> bool {
    match updates_tx.try_send(update) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("Updates channel full, dropping notification");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        assert!(notify(&tx, PriceUpdate::StreamBatch(vec![])));
        // full, still alive
        assert!(notify(&tx, PriceUpdate::StreamBatch(vec![])));
        drop(rx);
        assert!(!notify(&tx, PriceUpdate::StreamBatch(vec![])));
    }

    #[test]
    fn test_trigger_coalesces_fires() {
        let trigger = PassTrigger::new();
        assert_eq!(trigger.take(), 0);

        trigger.fire();
        trigger.fire();
        assert_eq!(trigger.take(), 2);
        assert_eq!(trigger.take(), 0);
    }

    #[tokio::test]
    async fn test_trigger_fired_before_wait_is_kept() {
        let trigger = Arc::new(PassTrigger::new());
        trigger.fire();
        assert_eq!(trigger.wait().await, 1);

        let waiter = tokio::spawn({
            let trigger = Arc::clone(&trigger);
            async move { trigger.wait().await }
        });
        tokio::task::yield_now().await;
        trigger.fire();
        assert_eq!(waiter.await.unwrap(), 1);
    }

    #[test]
    fn test_state_cell_publishes_transitions() {
        let (tx, mut rx) = mpsc::channel(4);
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Disconnected);

        cell.set(FeedSource::Push, ConnectionState::Connecting, &tx);
        assert_eq!(cell.get(), ConnectionState::Connecting);
        assert!(matches!(
            rx.try_recv().unwrap(),
            PriceUpdate::Connection { source: FeedSource::Push, state: ConnectionState::Connecting }
        ));
    }
}
