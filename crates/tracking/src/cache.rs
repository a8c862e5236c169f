use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// A cached value together with the version the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored JSON document.
    pub value: Value,
    /// Monotonically increasing per-key write counter, used for
    /// optimistic concurrency control.
    pub version: u64,
}

/// Version an entry must have for a `put_versioned` insert to succeed,
/// meaning the key must not exist yet.
pub const VERSION_NONE: u64 = 0;

/// Core trait for the tracking cache backends.
///
/// Entries are JSON documents addressed by `(namespace, key)` and bounded
/// by a TTL. Every write bumps the entry version; `put_versioned` lets
/// callers detect concurrent writers. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Retrieves an entry.
    ///
    /// Returns None if the key is absent or its TTL has elapsed.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>>;

    /// Writes an entry unconditionally, resetting its TTL.
    ///
    /// Returns the version assigned to the write.
    async fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> Result<u64>;

    /// Writes an entry only if its current version equals `expected_version`,
    /// resetting the TTL on success.
    ///
    /// Pass [`VERSION_NONE`] to require that the key does not exist. Fails
    /// with `VersionConflict` if another writer got there first.
    ///
    /// Returns the version assigned to the write.
    async fn put_versioned(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        expected_version: u64,
        ttl: Duration,
    ) -> Result<u64>;

    /// Removes an entry. Removing an absent key is not an error.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;
}

/// Renders the storage key for a namespaced entry.
pub(crate) fn build_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}
