use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::pattern::KeyFilter;
use crate::traits::Backend;
use crate::types::BulkOp;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Process-local backend keeping encoded records in a sorted map.
///
/// Clones share the same records, so a test can keep a handle to inspect what actually reached the backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored, encoded form of a record.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Error = MemoryError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.records.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.records.write().remove(key);
        Ok(())
    }

    async fn find_keys(&self, pattern: &str, exclude: Option<&str>) -> Result<Vec<String>, Self::Error> {
        let filter = KeyFilter::new(pattern, exclude)?;
        Ok(self
            .records
            .read()
            .keys()
            .filter(|key| filter.matches(key))
            .cloned()
            .collect())
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    // All or nothing: the whole batch is applied under a single write lock.
    async fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), Self::Error> {
        let mut records = self.records.write();
        for op in ops {
            match op {
                BulkOp::Set { key, value } => {
                    records.insert(key.clone(), value.clone());
                }
                BulkOp::Remove { key } => {
                    records.remove(key);
                }
            }
        }
        Ok(())
    }
}
