//! Crash-safe client order ids.

use crate::constants::{CLIENT_ID_PREFIX, SEQUENCE_BOUND};
use crate::error::GridResult;
use crate::model::{ClientOrderId, OrderSide};
use crate::store::{get_json, set_json, Store, StoreKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct SequencerRecord {
    sequence: u64,
    buys: u64,
    sells: u64,
}

/// Hands out `{prefix}-{sells}-{buys}-{sequence}` ids with the sequence
/// wrapping modulo [`SEQUENCE_BOUND`].
///
/// The counter record is written through the store inside the mutex before
/// an id is returned, so two callers never observe the same pre-increment
/// value and a restarted process resumes from the persisted counter, not a
/// stale in-memory copy. One sequencer per process.
pub struct OrderIdSequencer {
    store: Arc<dyn Store>,
    key: StoreKey,
    cached: Mutex<Option<SequencerRecord>>,
}

impl OrderIdSequencer {
    pub fn new(store: Arc<dyn Store>, exchange: &str) -> Self {
        Self {
            store,
            key: StoreKey::new(exchange, "sequencer", "global"),
            cached: Mutex::new(None),
        }
    }

    pub async fn next(&self, side: OrderSide) -> GridResult<ClientOrderId> {
        let mut cached = self.cached.lock().await;
        let mut record = match *cached {
            Some(record) => record,
            None => get_json(self.store.as_ref(), &self.key)?.unwrap_or_default(),
        };

        record.sequence = (record.sequence + 1) % SEQUENCE_BOUND;
        match side {
            OrderSide::Buy => record.buys += 1,
            OrderSide::Sell => record.sells += 1,
        }

        // Persist before handing the id out; the stored value is
        // authoritative across restarts.
        set_json(self.store.as_ref(), &self.key, &record)?;
        *cached = Some(record);

        Ok(ClientOrderId(format!(
            "{}-{}-{}-{}",
            CLIENT_ID_PREFIX, record.sells, record.buys, record.sequence
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;

    #[tokio::test]
    async fn sequential_ids_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(FileStore::new(dir.path()).unwrap());
        let sequencer = OrderIdSequencer::new(store, "paper");

        let a = sequencer.next(OrderSide::Buy).await.unwrap();
        let b = sequencer.next(OrderSide::Buy).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.0, "grid-0-1-1");
        assert_eq!(b.0, "grid-0-2-2");
    }

    #[tokio::test]
    async fn survives_restart_without_repeating() {
        let dir = tempfile::tempdir().unwrap();

        let first = {
            let store: Arc<dyn Store> = Arc::new(FileStore::new(dir.path()).unwrap());
            let sequencer = OrderIdSequencer::new(store, "paper");
            sequencer.next(OrderSide::Sell).await.unwrap()
        };

        // Fresh sequencer over the same store simulates a process restart.
        let store: Arc<dyn Store> = Arc::new(FileStore::new(dir.path()).unwrap());
        let sequencer = OrderIdSequencer::new(store, "paper");
        let second = sequencer.next(OrderSide::Sell).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(first.0, "grid-1-0-1");
        assert_eq!(second.0, "grid-2-0-2");
    }

    #[tokio::test]
    async fn sequence_wraps_at_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(FileStore::new(dir.path()).unwrap());
        // Seed the persisted counter just below the wrap point.
        let key = StoreKey::new("paper", "sequencer", "global");
        set_json(
            store.as_ref(),
            &key,
            &SequencerRecord {
                sequence: SEQUENCE_BOUND - 1,
                buys: 10,
                sells: 10,
            },
        )
        .unwrap();

        let sequencer = OrderIdSequencer::new(store, "paper");
        let id = sequencer.next(OrderSide::Buy).await.unwrap();
        assert_eq!(id.0, "grid-10-11-0");
    }
}
