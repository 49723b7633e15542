use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::BulkOp;

/// Storage adapter contract.
///
/// Values cross this boundary in their encoded string form. A backend that can apply many operations in one call
/// reports it via [`supports_bulk`](Backend::supports_bulk); write buffering is only allowed for such backends.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    async fn init(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;
    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;
    async fn remove(&self, key: &str) -> Result<(), Self::Error>;

    /// Keys matching `pattern` and not matching `exclude`. `*` stands for any run of characters.
    async fn find_keys(&self, pattern: &str, exclude: Option<&str>) -> Result<Vec<String>, Self::Error>;

    fn supports_bulk(&self) -> bool {
        false
    }

    /// Applies `ops` in one go. The default is a plain sequence of single-record calls, which is what a backend
    /// without [`supports_bulk`](Backend::supports_bulk) effectively has.
    async fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), Self::Error> {
        for op in ops {
            match op {
                BulkOp::Set { key, value } => self.set(key, value).await?,
                BulkOp::Remove { key } => self.remove(key).await?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<B> Backend for Arc<B>
where
    B: Backend,
{
    type Error = B::Error;

    async fn init(&self) -> Result<(), Self::Error> {
        (**self).init().await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        (**self).close().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Self::Error> {
        (**self).remove(key).await
    }

    async fn find_keys(&self, pattern: &str, exclude: Option<&str>) -> Result<Vec<String>, Self::Error> {
        (**self).find_keys(pattern, exclude).await
    }

    fn supports_bulk(&self) -> bool {
        (**self).supports_bulk()
    }

    async fn do_bulk(&self, ops: &[BulkOp]) -> Result<(), Self::Error> {
        (**self).do_bulk(ops).await
    }
}
