//! # kv-facade
//!
//! A key/value façade in front of interchangeable storage backends: SQL tables, document stores, in-memory maps,
//! search indices. Whatever the backend is, the application sees the same API with JSON values and nested path
//! access, while the crate takes care of making a slow backend fast and a flaky one predictable.
//!
//! # The Basics
//!
//! - Backends only implement [`Backend`]: single-record `get`/`set`/`remove`, key search, and optionally bulk writes.
//! - Records are cached with LRU eviction. Records waiting to be written are never evicted, so the cache capacity is a
//!   target rather than a hard limit.
//! - Writes are buffered and flushed periodically as one bulk call. If the bulk call fails, every operation is retried
//!   on its own and each writer learns about its own outcome only.
//! - Operations on the same key run strictly one after another in the order they were issued. Different keys never
//!   wait for each other.
//! - [`Database::get_sub`] and [`Database::set_sub`] read and modify values nested inside a record.
//! - Every stage is counted, see [`metrics`].
//!
//! ```ignore
//! use kv_facade::prelude::*;
//! use serde_json::json;
//!
//! let settings = Settings::builder().cache(1_000).build()?;
//! let db = Database::open(MemoryBackend::new(), settings).await?;
//! db.set("valueA", json!({"a": 1, "b": 2})).await?;
//! assert_eq!(db.get("valueA").await?, Some(json!({"a": 1, "b": 2})));
//! db.close().await?;
//! ```

pub mod backend;
pub(crate) mod buffer;
pub(crate) mod cache;
pub mod codec;
pub mod database;
pub(crate) mod engine;
pub(crate) mod entry;
pub mod error;
pub mod lru;
pub mod metrics;
pub mod pattern;
pub(crate) mod sequencer;
pub mod settings;
pub mod sub_value;
#[cfg(feature = "tracing")]
pub mod telemetry;
pub mod traits;
pub mod types;

#[doc(inline)]
pub use backend::MemoryBackend;
#[doc(inline)]
pub use database::Database;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use error::Result;
#[doc(inline)]
pub use settings::Settings;
#[doc(inline)]
pub use traits::Backend;

pub mod prelude {
    pub use crate::backend::MemoryBackend;
    pub use crate::database::Database;
    pub use crate::error::Error;
    pub use crate::metrics::Counter;
    pub use crate::metrics::MetricsSnapshot;
    pub use crate::settings::Settings;
    pub use crate::traits::Backend;
    pub use crate::types::*;
}
