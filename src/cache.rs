use fieldx::error::FieldXError;
use fieldx::fxstruct;
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::entry::ClaimedWrite;
use crate::lru::Lru;
use crate::types::Waiter;

#[derive(Debug)]
pub(crate) struct CacheState {
    records:         Lru<String, CacheEntry>,
    // Whether the periodic flusher task is expected to be alive. Kept next to the records so that checking for dirty
    // entries and parking the flusher is one step.
    flusher_running: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Staged {
    pub(crate) obsoletes:     bool,
    pub(crate) start_flusher: bool,
}

/// Record cache and write buffer in one structure: the buffer is the set of dirty entries.
///
/// The state lock is never held across an await point. Key-scoped mutations happen under the key's sequencer slot,
/// flush passes only flip entries between dirty and in-flight.
#[fxstruct(sync, no_new, default(off), builder)]
pub(crate) struct RecordCache {
    capacity: usize,

    #[fieldx(lazy, lock, get, get_mut, builder(off))]
    state: CacheState,
}

impl RecordCache {
    pub(crate) fn new(capacity: usize) -> Result<Self, FieldXError> {
        Self::builder().capacity(capacity).build()
    }

    fn build_state(&self) -> CacheState {
        CacheState {
            records:         Lru::with_evictable(self.capacity, |_, entry: &CacheEntry| entry.is_evictable()),
            flusher_running: false,
        }
    }

    /// `Some(value)` on a hit, where the value itself is `None` for a known-absent record.
    pub(crate) fn lookup(&self, key: &str) -> Option<Option<Value>> {
        self.state_mut().records.get(key, true).map(|entry| entry.value.clone())
    }

    /// Stores a value known to match the backend.
    pub(crate) fn fill(&self, key: &str, value: Option<Value>) {
        let mut state = self.state_mut();
        state.records.set(key.to_owned(), CacheEntry::clean(value));
        state.records.evict_old();
    }

    pub(crate) fn invalidate(&self, key: &str) {
        self.state_mut().records.remove(key);
    }

    pub(crate) fn stage(
        &self,
        key: &str,
        value: Option<Value>,
        raw: Option<String>,
        stamp: u64,
        waiter: Waiter,
    ) -> Staged {
        let mut state = self.state_mut();

        let obsoletes = if let Some(entry) = state.records.get_mut(key, true) {
            entry.stage(value, raw, stamp, waiter)
        }
        else {
            let mut entry = CacheEntry::default();
            entry.stage(value, raw, stamp, waiter);
            state.records.set(key.to_owned(), entry);
            false
        };
        state.records.evict_old();

        let start_flusher = !state.flusher_running;
        state.flusher_running = true;

        Staged {
            obsoletes,
            start_flusher,
        }
    }

    /// Claims up to `limit` dirty entries (0 means no limit). With `upto` only entries holding a write buffered no
    /// later than the given stamp are taken. A rewrite of such an entry is claimed along with it.
    pub(crate) fn claim(&self, limit: usize, upto: Option<u64>) -> Vec<ClaimedWrite> {
        let mut state = self.state_mut();
        let mut claimed = Vec::new();

        for (key, entry) in state.records.iter_mut() {
            if limit > 0 && claimed.len() >= limit {
                break;
            }
            let due = match (upto, entry.since) {
                (None, _) => true,
                (Some(upto), Some(since)) => since <= upto,
                (Some(_), None) => false,
            };
            if entry.dirty && due {
                claimed.push(entry.claim(key));
            }
        }

        claimed
    }

    /// Records the backend's verdict on a claimed write. A failed write drops the entry unless it has been rewritten
    /// since, so that reads go back to the backend instead of serving a value it never accepted.
    pub(crate) fn settle(&self, key: &str, succeeded: bool) {
        let mut state = self.state_mut();
        let drop_entry = match state.records.get_mut(key, false) {
            Some(entry) => {
                entry.writing = false;
                !succeeded && !entry.dirty
            }
            None => false,
        };
        if drop_entry {
            state.records.remove(key);
        }
        state.records.evict_old();
    }

    pub(crate) fn has_dirty(&self) -> bool {
        self.state().records.iter().any(|(_, entry)| entry.dirty)
    }

    /// Clears the running flag if nothing is left to flush. The check and the flag change are atomic with respect to
    /// [`stage`](Self::stage), so a write is never left without a flusher.
    pub(crate) fn park_flusher_if_idle(&self) -> bool {
        let mut state = self.state_mut();
        if state.records.iter().any(|(_, entry)| entry.dirty) {
            return false;
        }
        state.flusher_running = false;
        true
    }

    pub(crate) fn flusher_stopped(&self) {
        self.state_mut().flusher_running = false;
    }

    pub(crate) fn clear(&self) {
        self.state_mut().records.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.state().records.len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.state().records.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::types::BulkOp;

    fn stage(cache: &RecordCache, key: &str, value: i64, stamp: u64) -> (Staged, oneshot::Receiver<crate::Result<()>>) {
        let (tx, rx) = oneshot::channel();
        let staged = cache.stage(key, Some(json!(value)), Some(value.to_string()), stamp, tx);
        (staged, rx)
    }

    #[test]
    fn dirty_entries_survive_zero_capacity() {
        let cache = RecordCache::new(0).unwrap();
        cache.fill("clean", Some(json!(1)));
        assert!(!cache.contains("clean"));

        let (staged, _rx) = stage(&cache, "dirty", 2, 1);
        assert!(staged.start_flusher);
        assert!(cache.contains("dirty"));

        let claimed = cache.claim(0, None);
        assert_eq!(claimed.len(), 1);
        assert!(cache.contains("dirty"), "in-flight entries are pinned");

        cache.settle("dirty", true);
        assert!(!cache.contains("dirty"));
    }

    #[test]
    fn claim_respects_limit_and_stamp() {
        let cache = RecordCache::new(10).unwrap();
        let mut receivers = vec![];
        for (stamp, key) in ["a", "b", "c"].into_iter().enumerate() {
            receivers.push(stage(&cache, key, stamp as i64, stamp as u64 + 1).1);
        }

        let first = cache.claim(2, None);
        assert_eq!(
            first.iter().map(|c| c.op.clone()).collect::<Vec<_>>(),
            vec![BulkOp::set("a", "0"), BulkOp::set("b", "1")]
        );

        assert!(cache.claim(0, Some(2)).is_empty(), "c was buffered after stamp 2");
        assert_eq!(cache.claim(0, Some(3)).len(), 1);
        assert!(!cache.has_dirty());
    }

    #[test]
    fn rewritten_entry_keeps_its_place_in_a_bounded_claim() {
        let cache = RecordCache::new(10).unwrap();
        let (_, first) = stage(&cache, "k", 1, 1);
        let (staged, second) = stage(&cache, "k", 2, 5);
        assert!(staged.obsoletes);

        // Stamp 5 is past the bound, but the entry also carries the write with stamp 1.
        let claimed = cache.claim(0, Some(1));
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].op, BulkOp::set("k", "2"));
        assert_eq!(claimed[0].waiters.len(), 2);
        drop((first, second));

        let (_, _third) = stage(&cache, "k", 3, 6);
        assert!(cache.claim(0, Some(5)).is_empty(), "a rewrite of an in-flight entry starts a new age");
        assert_eq!(cache.claim(0, Some(6)).len(), 1);
    }

    #[test]
    fn failed_write_drops_entry_unless_rewritten() {
        let cache = RecordCache::new(10).unwrap();
        let _rx = stage(&cache, "a", 1, 1).1;
        let _rx = stage(&cache, "b", 1, 2).1;
        let _claimed = cache.claim(0, None);

        let (staged, _rx) = stage(&cache, "b", 2, 3);
        assert!(staged.obsoletes);
        assert!(!staged.start_flusher);

        cache.settle("a", false);
        cache.settle("b", false);
        assert!(!cache.contains("a"));
        assert_eq!(cache.lookup("b"), Some(Some(json!(2))));
    }

    #[test]
    fn flusher_parks_only_when_idle() {
        let cache = RecordCache::new(10).unwrap();
        let _rx = stage(&cache, "a", 1, 1).1;
        assert!(!cache.park_flusher_if_idle());

        let _claimed = cache.claim(0, None);
        assert!(cache.park_flusher_if_idle());

        let (staged, _rx) = stage(&cache, "a", 2, 2);
        assert!(staged.start_flusher, "a parked flusher must be restarted");
    }
}
