use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tracing::instrument;

use crate::engine::Engine;
use crate::error::Error;
use crate::error::Result;
use crate::metrics::MetricsSnapshot;
use crate::settings::Settings;
use crate::sub_value;
use crate::traits::Backend;
use crate::types::WriteCompletion;

/// Caching, write-buffering key/value store in front of a [`Backend`].
///
/// ```ignore
/// let db = Database::open(MemoryBackend::new(), Settings::builder().build()?).await?;
///
/// db.set("pad:1", json!({"text": "hello", "rev": 1})).await?;
/// db.set_sub("pad:1", &["rev"], json!(2)).await?;
/// assert_eq!(db.get_sub("pad:1", &["rev"]).await?, Some(json!(2)));
///
/// // Don't wait for the backend, just make sure the write is queued.
/// let pending = db.set_deferred("pad:2", json!("draft")).await?;
/// db.flush().await;
/// pending.await?;
///
/// db.close().await?;
/// ```
///
/// Operations on the same key run one at a time in the order they were issued; operations on different keys run
/// concurrently. Values are copied on the way in and out, so nothing a caller does to a returned value affects the
/// cache.
///
/// Buffered writes that have not been flushed are lost if the database is dropped without [`close`](Self::close).
pub struct Database<B>
where
    B: Backend,
{
    engine: Arc<Engine<B>>,
}

impl<B> Clone for Database<B>
where
    B: Backend,
{
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<B> Database<B>
where
    B: Backend,
{
    /// Validates `settings` against the backend's capabilities and initializes the backend.
    #[instrument(level = "debug", skip_all, fields(name = %settings.name()))]
    pub async fn open(backend: B, settings: Settings) -> Result<Self> {
        if settings.buffering() && !backend.supports_bulk() {
            return Err(Error::Config(format!(
                "write_interval of {:?} requires a backend with bulk write support; set it to zero to disable \
                 buffering",
                settings.write_interval()
            )));
        }

        backend.init().await.map_err(Error::backend)?;
        debug!(
            "[{}] opened; cache={}, write_interval={:?}, bulk_limit={}, json={}",
            settings.name(),
            settings.cache(),
            settings.write_interval(),
            settings.bulk_limit(),
            settings.json()
        );

        Ok(Self {
            engine: Engine::new(backend, settings)?,
        })
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.engine.lock_record(key).await;
        self.engine.read_locked(key).await
    }

    /// Stores `value` and waits until the backend has it. A `null` value removes the record.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_deferred(key, value).await?.wait().await
    }

    /// Stores `value` and returns as soon as the write is queued. Values that cannot be encoded are rejected here.
    #[instrument(level = "trace", skip(self, value))]
    pub async fn set_deferred(&self, key: &str, value: Value) -> Result<WriteCompletion> {
        let _guard = self.engine.lock_record(key).await;
        self.engine.write_locked(key, non_null(value)).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.remove_deferred(key).await?.wait().await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn remove_deferred(&self, key: &str) -> Result<WriteCompletion> {
        let _guard = self.engine.lock_record(key).await;
        self.engine.write_locked(key, None).await
    }

    /// Value nested at `path` inside the record, or `None` if any step along the way is missing.
    #[instrument(level = "trace", skip(self, path))]
    pub async fn get_sub<S>(&self, key: &str, path: &[S]) -> Result<Option<Value>>
    where
        S: AsRef<str> + Sync,
    {
        let _guard = self.engine.lock_record(key).await;
        let record = self.engine.read_locked(key).await?;
        Ok(record
            .as_ref()
            .and_then(|record| sub_value::lookup(record, path))
            .filter(|v| !v.is_null())
            .cloned())
    }

    /// Sets the value nested at `path`, creating missing intermediate objects, and waits for the write to complete.
    ///
    /// The read and the write happen within one turn of the key, so no other writer can slip in between. Fails with
    /// [`Error::PathType`] if the path runs into a non-container value or uses a reserved segment; the record is left
    /// untouched then.
    #[instrument(level = "trace", skip(self, path, value))]
    pub async fn set_sub<S>(&self, key: &str, path: &[S], value: Value) -> Result<()>
    where
        S: AsRef<str> + Sync,
    {
        let completion = {
            let _guard = self.engine.lock_record(key).await;
            let record = self.engine.read_locked(key).await?;
            let updated = sub_value::assign(key, record, path, value)?;
            self.engine.write_locked(key, non_null(updated)).await?
        };
        completion.wait().await
    }

    /// Keys matching `pattern` (`*` is a wildcard) but not `exclude`. Buffered writes are flushed first, so the result
    /// reflects them.
    #[instrument(level = "trace", skip(self))]
    pub async fn find_keys(&self, pattern: &str, exclude: Option<&str>) -> Result<Vec<String>> {
        let _guard = self.engine.lock_query(pattern, exclude).await;
        self.engine.flush_all().await;
        self.engine
            .backend
            .find_keys(pattern, exclude)
            .await
            .map_err(Error::backend)
    }

    /// Sends every write buffered so far to the backend. Individual outcomes are reported to the writers, not here.
    pub async fn flush(&self) {
        self.engine.flush_all().await;
    }

    /// Flushes pending writes, stops background activity and closes the backend.
    #[instrument(level = "debug", skip(self), fields(name = %self.engine.name()))]
    pub async fn close(&self) -> Result<()> {
        self.engine.shutdown().await;
        debug!("[{}] closing; {}", self.engine.name(), self.metrics());
        self.engine.backend.close().await.map_err(Error::backend)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics.snapshot()
    }

    pub fn settings(&self) -> &Settings {
        &self.engine.settings
    }

    pub fn backend(&self) -> &B {
        &self.engine.backend
    }

    /// Number of records currently held by the cache, dirty ones included.
    pub fn cached_records(&self) -> usize {
        self.engine.cache.len()
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.engine.cache.contains(key)
    }

    /// `true` while some buffered write has not been handed to the backend yet.
    pub fn has_pending_writes(&self) -> bool {
        self.engine.cache.has_dirty()
    }

    /// Number of keys with an operation running or waiting.
    pub fn busy_keys(&self) -> usize {
        self.engine.sequencer.active_keys()
    }
}

#[inline]
fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}
