use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::warn;

use crate::engine::Engine;
use crate::error::Error;
use crate::error::Result;
use crate::metrics::Counter;
use crate::traits::Backend;
use crate::types::BulkOp;
use crate::types::Waiter;
use crate::types::WriteCompletion;

impl<B> Engine<B>
where
    B: Backend,
{
    /// Writes a record, `None` meaning removal. Must be called with the key's sequencer slot held.
    ///
    /// An encoding failure is returned right away and nothing is buffered. Otherwise the returned completion resolves
    /// once the backend has accepted or rejected the value.
    pub(crate) async fn write_locked(&self, key: &str, value: Option<Value>) -> Result<WriteCompletion> {
        self.metrics.incr(Counter::Writes);

        let raw = match value.as_ref().map(|v| self.codec.encode(key, v)).transpose() {
            Ok(raw) => raw,
            Err(err) => {
                self.metrics.incr(Counter::WritesFailed);
                return Err(err);
            }
        };

        if !self.settings.buffering() {
            let result = self.write_direct(key, value, raw).await;
            self.metrics.incr(if result.is_ok() {
                Counter::WritesFinished
            }
            else {
                Counter::WritesFailed
            });
            return Ok(WriteCompletion::done(key, result));
        }

        let (waiter, receiver) = oneshot::channel();
        let stamp = self.write_stamp.fetch_add(1, Ordering::SeqCst) + 1;
        let staged = self.cache.stage(key, value, raw, stamp, waiter);

        if staged.obsoletes {
            self.metrics.incr(Counter::WritesObsoleted);
        }
        if staged.start_flusher {
            self.start_flusher();
        }

        Ok(WriteCompletion::pending(key, receiver))
    }

    async fn write_direct(&self, key: &str, value: Option<Value>, raw: Option<String>) -> Result<()> {
        let op = BulkOp::from_raw(key, raw);
        self.metrics.incr(Counter::WritesToDb);

        let result = self.apply_one(&op).await;
        match result {
            Ok(()) => {
                self.metrics.incr(Counter::WritesToDbFinished);
                self.cache.fill(key, value);
            }
            Err(ref err) => {
                self.metrics.incr(Counter::WritesToDbFailed);
                error!("[{}] {} of '{key}' failed: {err}", self.name(), op.op_type());
                self.cache.invalidate(key);
            }
        }
        result
    }

    async fn apply_one(&self, op: &BulkOp) -> Result<()> {
        match op {
            BulkOp::Set { key, value } => self.backend.set(key, value).await,
            BulkOp::Remove { key } => self.backend.remove(key).await,
        }
        .map_err(Error::backend)
    }

    /// Runs one flush pass: claims dirty entries (at most `bulk_limit` of them), sends them in one bulk call and falls
    /// back to one call per record if the bulk call fails. Returns the number of claimed entries.
    #[instrument(level = "trace", skip(self), fields(name = %self.settings.name()))]
    pub(crate) async fn flush_once(&self, upto: Option<u64>) -> usize {
        let _pass = self.flush_lock.lock().await;

        let claimed = self.cache.claim(self.settings.bulk_limit(), upto);
        if claimed.is_empty() {
            return 0;
        }

        let count = claimed.len();
        debug!("[{}] flushing {count} buffered write(s)", self.name());
        self.metrics.add(Counter::WritesToDb, count as u64);

        let (ops, waiters): (Vec<BulkOp>, Vec<Vec<Waiter>>) =
            claimed.into_iter().map(|claim| (claim.op, claim.waiters)).unzip();

        match self.backend.do_bulk(&ops).await {
            Ok(()) => {
                for (op, waiters) in ops.iter().zip(waiters) {
                    self.settle(op, waiters, Ok(()));
                }
            }
            Err(err) => {
                warn!(
                    "[{}] bulk write of {count} operation(s) failed, retrying one by one: {err}",
                    self.name()
                );
                for (op, waiters) in ops.iter().zip(waiters) {
                    self.metrics.incr(Counter::WritesToDbRetried);
                    let result = self.apply_one(op).await;
                    if let Err(ref err) = result {
                        error!("[{}] {} of '{}' failed: {err}", self.name(), op.op_type(), op.key());
                    }
                    self.settle(op, waiters, result);
                }
            }
        }

        count
    }

    fn settle(&self, op: &BulkOp, waiters: Vec<Waiter>, result: Result<()>) {
        self.metrics.incr(if result.is_ok() {
            Counter::WritesToDbFinished
        }
        else {
            Counter::WritesToDbFailed
        });
        self.cache.settle(op.key(), result.is_ok());

        for waiter in waiters {
            self.metrics.incr(if result.is_ok() {
                Counter::WritesFinished
            }
            else {
                Counter::WritesFailed
            });
            // The caller may have chosen not to wait.
            let _ = waiter.send(result.clone());
        }
    }

    /// Flushes every write buffered before the call. Writes that arrive meanwhile are left to the flusher.
    pub(crate) async fn flush_all(&self) {
        let upto = self.write_stamp.load(Ordering::SeqCst);
        while self.flush_once(Some(upto)).await > 0 {}
    }

    fn start_flusher(&self) {
        let engine = self.myself_downgrade();
        let interval = self.settings.write_interval();
        debug!("[{}] starting flusher, interval {interval:?}", self.name());
        let handle = tokio::spawn(async move { Self::run_flusher(engine, interval).await });
        // A replaced handle belongs to a parked flusher which is returning anyway.
        let _ = self.set_flusher(handle);
    }

    async fn run_flusher(engine: Weak<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;

            let Some(engine) = engine.upgrade()
            else {
                break;
            };

            engine.flush_once(None).await;

            // Don't hold on to a task while there's nothing to write.
            if engine.cache.park_flusher_if_idle() {
                debug!("[{}] write buffer is empty, flusher parked", engine.name());
                break;
            }
        }
    }

    /// Flushes everything, stops the flusher and forgets cached records.
    pub(crate) async fn shutdown(&self) {
        self.flush_all().await;
        if let Some(flusher) = self.clear_flusher() {
            flusher.abort();
        }
        self.cache.flusher_stopped();
        self.cache.clear();
    }
}
