//! Channel subscribers for fused records
//!
//! Delivery never blocks the fusion thread: a full channel either drops
//! the new record or evicts the oldest queued one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{DropPolicy, FusedRecord};
use ingestion::lock_unpoisoned;
use tracing::{debug, trace};

struct Subscriber {
    tx: Sender<FusedRecord>,
    /// Held for `DropOldest` eviction
    evict: Receiver<FusedRecord>,
    policy: DropPolicy,
}

#[derive(Default)]
pub struct Fanout {
    subscribers: Mutex<Vec<Subscriber>>,
    dropped: AtomicU64,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, capacity: usize, policy: DropPolicy) -> Receiver<FusedRecord> {
        let (tx, rx) = bounded(capacity.max(1));
        lock_unpoisoned(&self.subscribers).push(Subscriber {
            tx,
            evict: rx.clone(),
            policy,
        });
        debug!(capacity, policy = ?policy, "subscriber added");
        rx
    }

    /// Deliver to every live subscriber; prunes those whose receivers are gone
    pub fn broadcast(&self, record: &FusedRecord) {
        let mut subscribers = lock_unpoisoned(&self.subscribers);
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|sub| self.deliver(sub, record));
    }

    pub fn subscriber_count(&self) -> usize {
        lock_unpoisoned(&self.subscribers).len()
    }

    /// Records discarded because a subscriber channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, sub: &Subscriber, record: &FusedRecord) -> bool {
        // 只剩下我们自己持有的 evict 端
        if sub.tx.receiver_count() <= 1 {
            debug!("subscriber gone, removing");
            return false;
        }

        match sub.tx.try_send(record.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                match sub.policy {
                    DropPolicy::DropNewest => {
                        trace!(fusion_id = record.fusion_id, "record dropped (newest)");
                    }
                    DropPolicy::DropOldest => {
                        let evicted = sub.evict.try_recv().ok().map(|r| r.fusion_id);
                        let _ = sub.tx.try_send(record);
                        trace!(evicted = ?evicted, "record dropped (oldest)");
                    }
                }
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
