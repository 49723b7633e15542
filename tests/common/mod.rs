#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kv_facade::backend::memory::MemoryError;
use kv_facade::prelude::*;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::OwnedRwLockWriteGuard;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum FlakyError {
    #[error("injected failure: {0}")]
    Injected(String),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// What reached the backend, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Set(String, String),
    Remove(String),
    Bulk(Vec<BulkOp>),
}

/// Memory backend with scriptable failures and a gate to hold bulk writes in flight.
#[derive(Debug, Default)]
pub struct FlakyBackend {
    pub inner:        MemoryBackend,
    pub no_bulk:      bool,
    pub fail_bulk:    AtomicBool,
    pub fail_reads:   AtomicBool,
    pub failing_keys: Mutex<HashSet<String>>,
    pub calls:        Mutex<Vec<Call>>,
    pub bulk_calls:   AtomicUsize,
    pub bulk_started: Notify,
    pub held_started: Notify,
    gate:             Arc<RwLock<()>>,
    write_gate:       Arc<RwLock<()>>,
    held_key:         Mutex<Option<String>>,
}

impl FlakyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn without_bulk() -> Arc<Self> {
        Arc::new(Self {
            no_bulk: true,
            ..Default::default()
        })
    }

    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_owned());
    }

    pub fn set_fail_bulk(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Bulk writes block until the returned guard is dropped.
    pub async fn hold_bulk(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    /// Single-record writes of `key` block until the returned guard is dropped.
    pub async fn hold_writes_to(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        let guard = Arc::clone(&self.write_gate).write_owned().await;
        *self.held_key.lock() = Some(key.to_owned());
        guard
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Bulk(ops) => Some(ops.len()),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Set(..) | Call::Remove(_)))
            .cloned()
            .collect()
    }

    async fn pass_gate(&self, key: &str) {
        let held = self.held_key.lock().as_deref() == Some(key);
        if held {
            self.held_started.notify_one();
            let _gate = self.write_gate.read().await;
        }
    }

    fn check(&self, key: &str) -> Result<(), FlakyError> {
        if self.failing_keys.lock().contains(key) {
            return Err(FlakyError::Injected(format!("write of '{key}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    type Error = FlakyError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        self.calls.lock().push(Call::Get(key.to_owned()));
        tokio::task::yield_now().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FlakyError::Injected(format!("read of '{key}'")));
        }
        Ok(self.inner.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.calls.lock().push(Call::Set(key.to_owned(), value.to_owned()));
        tokio::task::yield_now().await;
        self.pass_gate(key).await;
        self.check(key)?;
        Ok(self.inner.set(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.calls.lock().push(Call::Remove(key.to_owned()));
        tokio::task::yield_now().await;
        self.pass_gate(key).await;
        self.check(key)?;
        Ok(self.inner.remove(key).await?)
    }

    async fn find_keys(&self, pattern: &str, exclude: Option<&str>) -> Result<Vec<String>, Self::Error> {
        Ok(self.inner.find_keys(pattern, exclude).await?)
    }

    fn supports_bulk(&self) -> bool {
        !self.no_bulk
    }

    async fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), Self::Error> {
        self.calls.lock().push(Call::Bulk(ops.to_vec()));
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.bulk_started.notify_one();
        let _gate = self.gate.read().await;

        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(FlakyError::Injected(format!("bulk of {} op(s)", ops.len())));
        }
        for op in ops {
            self.check(op.key())?;
        }
        Ok(self.inner.do_bulk(ops).await?)
    }
}

pub fn init() {
    kv_facade::telemetry::init_tracing();
}

/// Long enough that the periodic flusher never gets in the way of a test.
pub const NEVER: Duration = Duration::from_secs(3600);

pub fn buffered(name: &str) -> Settings {
    Settings::builder().name(name.to_string()).write_interval(NEVER).build().expect("settings")
}

pub fn direct(name: &str) -> Settings {
    Settings::builder()
        .name(name.to_string())
        .write_interval(Duration::ZERO)
        .build()
        .expect("settings")
}
