use std::error::Error as StdError;
use std::sync::Arc;

use fieldx::error::FieldXError;
use thiserror::Error;

/// Which way a value was travelling through the codec when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CodecDirection {
    Encode,
    Decode,
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// I/O failure reported by the backend adapter, passed through as is.
    #[error("backend error: {source}")]
    Backend {
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },

    #[error("cannot {direction} value of key '{key}': {reason}")]
    Codec {
        key:       String,
        direction: CodecDirection,
        reason:    String,
    },

    /// A sub-value operation hit a non-container or a reserved path segment.
    #[error("{message}")]
    PathType { key: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// The engine went away before the buffered write could be attempted.
    #[error("write to key '{key}' was abandoned before reaching the backend")]
    WriteAbandoned { key: String },
}

impl Error {
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend { source: Arc::new(err) }
    }

    pub(crate) fn codec(key: &str, direction: CodecDirection, reason: impl ToString) -> Self {
        Self::Codec {
            key: key.to_owned(),
            direction,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn path_type(key: &str, message: String) -> Self {
        Self::PathType {
            key: key.to_owned(),
            message,
        }
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Codec { .. })
    }

    pub fn is_path_type(&self) -> bool {
        matches!(self, Self::PathType { .. })
    }
}

impl From<FieldXError> for Error {
    fn from(err: FieldXError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
