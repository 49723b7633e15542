use serde_json::Value;

use crate::types::BulkOp;
use crate::types::Waiter;

/// What the record cache keeps for a key.
///
/// A clean entry (`dirty` and `writing` both unset) mirrors the backend and may be evicted. A dirty entry holds a
/// value the backend has not seen yet; `raw` is its encoded form and `waiters` are the callers expecting to hear about
/// the outcome. `writing` marks an entry whose previous value is being flushed right now.
#[derive(Debug, Default)]
pub(crate) struct CacheEntry {
    pub(crate) value:   Option<Value>,
    pub(crate) raw:     Option<String>,
    pub(crate) dirty:   bool,
    pub(crate) writing: bool,
    /// Sequence number of the oldest write not yet handed to the backend.
    pub(crate) since:   Option<u64>,
    pub(crate) waiters: Vec<Waiter>,
}

/// A dirty entry taken over by a flush pass.
#[derive(Debug)]
pub(crate) struct ClaimedWrite {
    pub(crate) op:      BulkOp,
    pub(crate) waiters: Vec<Waiter>,
}

impl CacheEntry {
    pub(crate) fn clean(value: Option<Value>) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    #[inline]
    pub(crate) fn is_evictable(&self) -> bool {
        !self.dirty && !self.writing
    }

    /// Buffers a new value. Returns `true` if the value supersedes one that is still waiting to be or being written.
    pub(crate) fn stage(&mut self, value: Option<Value>, raw: Option<String>, stamp: u64, waiter: Waiter) -> bool {
        let obsoletes = self.dirty || self.writing;
        if !self.dirty {
            self.since = Some(stamp);
        }
        self.value = value;
        self.raw = raw;
        self.dirty = true;
        self.waiters.push(waiter);
        obsoletes
    }

    /// Moves a dirty entry into the in-flight state and hands out what is to be written.
    pub(crate) fn claim(&mut self, key: &str) -> ClaimedWrite {
        self.dirty = false;
        self.writing = true;
        self.since = None;
        ClaimedWrite {
            op:      BulkOp::from_raw(key, self.raw.take()),
            waiters: std::mem::take(&mut self.waiters),
        }
    }
}
