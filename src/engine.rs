use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use fieldx::fxstruct;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::cache::RecordCache;
use crate::codec::Codec;
use crate::error::Error;
use crate::error::Result;
use crate::metrics::Counter;
use crate::metrics::Metrics;
use crate::sequencer::KeyGuard;
use crate::sequencer::Sequencer;
use crate::settings::Settings;
use crate::traits::Backend;

/// What the sequencer orders operations by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Record(String),
    // Key searches are not about any single record; each distinct query is serialized on its own.
    Query(String, Option<String>),
}

/// State shared by a [`Database`](crate::Database) and its flusher task.
#[fxstruct(sync, rc(vis(pub(crate))), no_new, default(off), builder)]
pub(crate) struct Engine<B>
where
    B: Backend,
{
    pub(crate) settings:  Settings,
    pub(crate) backend:   B,
    pub(crate) codec:     Codec,
    pub(crate) metrics:   Arc<Metrics>,
    pub(crate) cache:     RecordCache,
    pub(crate) sequencer: Sequencer<LockKey>,

    // Stamp of the latest buffered write.
    #[fieldx(builder(off), default(AtomicU64::new(0)))]
    pub(crate) write_stamp: AtomicU64,

    // Flush passes never overlap.
    #[fieldx(builder(off), default(tokio::sync::Mutex::new(())))]
    pub(crate) flush_lock: tokio::sync::Mutex<()>,

    #[fieldx(vis(pub(crate)), lock, clearer, set, builder(off))]
    flusher: JoinHandle<()>,
}

impl<B> Engine<B>
where
    B: Backend,
{
    pub(crate) fn new(backend: B, settings: Settings) -> Result<Arc<Self>> {
        let metrics = Arc::new(Metrics::default());
        Ok(Self::builder()
            .codec(Codec::new(settings.json()))
            .cache(RecordCache::new(settings.cache())?)
            .sequencer(Sequencer::new(Arc::clone(&metrics)))
            .metrics(metrics)
            .backend(backend)
            .settings(settings)
            .build()?)
    }

    #[inline]
    pub(crate) fn name(&self) -> String {
        self.settings.name()
    }

    pub(crate) async fn lock_record(&self, key: &str) -> KeyGuard<'_, LockKey> {
        self.sequencer.acquire(LockKey::Record(key.to_owned())).await
    }

    pub(crate) async fn lock_query(&self, pattern: &str, exclude: Option<&str>) -> KeyGuard<'_, LockKey> {
        self.sequencer
            .acquire(LockKey::Query(pattern.to_owned(), exclude.map(str::to_owned)))
            .await
    }

    /// Reads a record through the cache. Must be called with the key's sequencer slot held.
    pub(crate) async fn read_locked(&self, key: &str) -> Result<Option<Value>> {
        self.metrics.incr(Counter::Reads);

        if let Some(value) = self.cache.lookup(key) {
            trace!("[{}] cache hit for '{key}'", self.name());
            self.metrics.incr(Counter::ReadsFromCache);
            self.metrics.incr(Counter::ReadsFinished);
            return Ok(value);
        }

        self.metrics.incr(Counter::ReadsFromDb);
        let raw = match self.backend.get(key).await {
            Ok(raw) => {
                self.metrics.incr(Counter::ReadsFromDbFinished);
                raw
            }
            Err(err) => {
                self.metrics.incr(Counter::ReadsFromDbFailed);
                self.metrics.incr(Counter::ReadsFailed);
                return Err(Error::backend(err));
            }
        };

        let value = match raw {
            Some(raw) => match self.codec.decode(key, raw) {
                Ok(value) => value,
                Err(err) => {
                    self.metrics.incr(Counter::ReadsFailed);
                    return Err(err);
                }
            },
            None => None,
        };

        self.cache.fill(key, value.clone());
        self.metrics.incr(Counter::ReadsFinished);
        Ok(value)
    }
}

impl<B> Drop for Engine<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        if let Some(flusher) = self.clear_flusher() {
            flusher.abort();
        }
    }
}
