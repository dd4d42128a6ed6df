//! Error types for cache operations.
//!
//! Misses are never errors: lookups return `Ok(None)` when a key is absent.
//! [`CacheError`] is reserved for failures of the storage layer, invalid
//! configuration, undecodable payloads and worker tasks that died mid-operation.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Blob store operation that failed, carried by [`CacheError::Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Put,
    Get,
    Delete,
    List,
    DeleteAll,
    Open,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageOp::Put => "put",
            StorageOp::Get => "get",
            StorageOp::Delete => "delete",
            StorageOp::List => "list",
            StorageOp::DeleteAll => "delete_all",
            StorageOp::Open => "open",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The blob store failed to complete an operation.
    #[error("storage error during {op} of {key:?}: {source}")]
    Storage {
        op: StorageOp,
        /// Key involved, if the operation targeted a single entry.
        key: Option<String>,
        #[source]
        source: io::Error,
    },

    /// Invalid construction parameters (empty name or path, bad limits).
    #[error("configuration error: {0}")]
    Config(String),

    /// A stored payload could not be turned back into a value.
    #[error("cannot decode payload for key {key:?}: {reason}")]
    Decode { key: String, reason: String },

    /// An asynchronous worker task panicked before completing.
    #[error("cache task panicked: {0}")]
    TaskPanicked(String),
}

impl CacheError {
    /// Builds a storage error for an operation on a single key.
    pub fn storage(op: StorageOp, key: impl Into<String>, source: io::Error) -> Self {
        CacheError::Storage {
            op,
            key: Some(key.into()),
            source,
        }
    }

    /// Builds a storage error for an operation spanning the whole store.
    pub fn storage_all(op: StorageOp, source: io::Error) -> Self {
        CacheError::Storage {
            op,
            key: None,
            source,
        }
    }

    /// Returns `true` if this is a blob store failure.
    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::Storage { .. })
    }
}
