use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

use crate::metrics::Counter;
use crate::metrics::Metrics;

#[derive(Debug)]
struct Slot {
    lock:  Arc<AsyncMutex<()>>,
    // Holders plus waiters. The slot is torn down when it drops to zero.
    users: usize,
}

/// Runs operations addressed to the same key one at a time, in the order they arrive.
///
/// Each key lazily gets its own FIFO lock, so different keys never contend. Arrival order is the order in which
/// [`acquire`](Self::acquire) futures are first polled.
#[derive(Debug)]
pub(crate) struct Sequencer<K>
where
    K: Hash + Eq + Clone + Debug,
{
    slots:   Mutex<HashMap<K, Slot>>,
    metrics: Arc<Metrics>,
}

impl<K> Sequencer<K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub(crate) fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    pub(crate) async fn acquire(&self, key: K) -> KeyGuard<'_, K> {
        let lock = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                lock:  Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // From here on a cancelled acquire still gives its place back.
        let ticket = Ticket { sequencer: self, key };

        let permit = match Arc::clone(&lock).try_lock_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.incr(Counter::LockAwaits);
                tracing::trace!("waiting for key {:?}", ticket.key);
                lock.lock_owned().await
            }
        };
        // Counted only once held, so that every acquire is matched by a release.
        self.metrics.incr(Counter::LockAcquires);

        KeyGuard {
            _permit: permit,
            ticket,
        }
    }

    /// Number of keys with an operation running or queued.
    pub(crate) fn active_keys(&self) -> usize {
        self.slots.lock().len()
    }

    fn leave(&self, key: &K) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(key);
            }
        }
    }
}

struct Ticket<'a, K>
where
    K: Hash + Eq + Clone + Debug,
{
    sequencer: &'a Sequencer<K>,
    key:       K,
}

impl<K> Drop for Ticket<'_, K>
where
    K: Hash + Eq + Clone + Debug,
{
    fn drop(&mut self) {
        self.sequencer.leave(&self.key);
    }
}

/// Exclusive right to operate on a key. Released on drop.
pub(crate) struct KeyGuard<'a, K>
where
    K: Hash + Eq + Clone + Debug,
{
    // Field order matters: the lock must be released before the slot is left.
    _permit: OwnedMutexGuard<()>,
    ticket:  Ticket<'a, K>,
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Hash + Eq + Clone + Debug,
{
    fn drop(&mut self) {
        self.ticket.sequencer.metrics.incr(Counter::LockReleases);
    }
}
