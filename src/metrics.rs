//! Monotonic counters instrumenting locking, reads and writes of a [`Database`](crate::Database).
//!
//! Counters only ever grow during the lifetime of a database instance. Take a [`MetricsSnapshot`] before and after
//! an operation and use [`MetricsSnapshot::delta`] to see what it did.

use std::fmt::Display;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use strum::EnumCount;
use strum::IntoEnumIterator;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount, strum::EnumIter, strum::IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Counter {
    LockAcquires,
    LockAwaits,
    LockReleases,
    Reads,
    ReadsFailed,
    ReadsFinished,
    ReadsFromCache,
    ReadsFromDb,
    ReadsFromDbFailed,
    ReadsFromDbFinished,
    Writes,
    WritesFailed,
    WritesFinished,
    WritesObsoleted,
    WritesToDb,
    WritesToDbFailed,
    WritesToDbFinished,
    WritesToDbRetried,
}

#[derive(Debug)]
pub struct Metrics {
    counters: [AtomicU64; Counter::COUNT],
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl Metrics {
    #[inline]
    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    #[inline]
    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            values: std::array::from_fn(|i| self.counters[i].load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    values: [u64; Counter::COUNT],
}

impl MetricsSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter as usize]
    }

    /// Per-counter difference between this snapshot and an `earlier` one.
    pub fn delta(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            values: std::array::from_fn(|i| self.values[i].saturating_sub(earlier.values[i])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        Counter::iter().map(|c| (c, self.get(c)))
    }

    /// Counters with non-zero values; handy for comparing deltas in tests.
    pub fn non_zero(&self) -> Vec<(Counter, u64)> {
        self.iter().filter(|(_, v)| *v > 0).collect()
    }
}

impl Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (counter, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{counter}={value}")?;
        }
        Ok(())
    }
}
