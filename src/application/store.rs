//! Key-value store capability consumed by the history service.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid store key: {reason}")]
    InvalidKey { reason: &'static str },
    #[error("store operation `{operation}` timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}

impl StoreError {
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Durable string-keyed byte store.
///
/// There is no compare-and-swap: callers doing read-modify-write accept that
/// concurrent writers can overwrite each other.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Cheap liveness check used by the health endpoint.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
