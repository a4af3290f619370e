//! Best-effort broadcast of import operation changes.

use strata_core::progress::ImportOperationUpdate;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of [`ImportOperationUpdate`]s to live subscribers.
///
/// Nothing is persisted or replayed. A subscriber that joins late or lags
/// behind misses updates and must re-read the registry.
#[derive(Clone)]
pub struct ProgressNotifier {
    tx: broadcast::Sender<ImportOperationUpdate>,
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send `update` to everyone currently subscribed.
    pub fn publish(&self, update: ImportOperationUpdate) {
        let id = update.id.clone();
        let status = update.status;
        // No receivers is fine.
        let receivers = self.tx.send(update).unwrap_or(0);
        tracing::debug!(%id, ?status, receivers, "import progress published");
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImportOperationUpdate> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
