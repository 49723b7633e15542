use std::future::Future;
use std::future::IntoFuture;
use std::pin::Pin;

use tokio::sync::oneshot;

use crate::error::Error;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OpType {
    Set,
    Remove,
}

/// A single operation of a bulk write, values already encoded for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl BulkOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key:   key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    pub(crate) fn from_raw(key: &str, raw: Option<String>) -> Self {
        match raw {
            Some(value) => Self::set(key, value),
            None => Self::remove(key),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }

    pub fn op_type(&self) -> OpType {
        match self {
            Self::Set { .. } => OpType::Set,
            Self::Remove { .. } => OpType::Remove,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Set { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }
}

pub(crate) type Waiter = oneshot::Sender<Result<()>>;

enum Completion {
    Done(Result<()>),
    Pending(oneshot::Receiver<Result<()>>),
}

/// Outcome of a write that has been accepted by the database.
///
/// Dropping it is fine: the write proceeds regardless. Await it (or call [`WriteCompletion::wait`]) to learn whether
/// the backend actually accepted the value.
pub struct WriteCompletion {
    key:        String,
    completion: Completion,
}

impl WriteCompletion {
    pub(crate) fn done(key: &str, result: Result<()>) -> Self {
        Self {
            key:        key.to_owned(),
            completion: Completion::Done(result),
        }
    }

    pub(crate) fn pending(key: &str, receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            key:        key.to_owned(),
            completion: Completion::Pending(receiver),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `true` if the write has not been buffered but already went to the backend.
    pub fn is_done(&self) -> bool {
        matches!(self.completion, Completion::Done(_))
    }

    pub async fn wait(self) -> Result<()> {
        match self.completion {
            Completion::Done(result) => result,
            Completion::Pending(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(Error::WriteAbandoned { key: self.key })),
        }
    }
}

impl IntoFuture for WriteCompletion {
    type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
    type Output = Result<()>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl std::fmt::Debug for WriteCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCompletion")
            .field("key", &self.key)
            .field("done", &self.is_done())
            .finish()
    }
}
