use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    Result, TrackingError,
    cache::{CacheEntry, CacheStore, VERSION_NONE, build_key},
};

struct StoredEntry {
    value: Value,
    version: u64,
    expires_at: Instant,
}

/// In-memory cache implementation.
///
/// Backs the tracking store in tests and single-process deployments.
/// Expiry is lazy: entries past their deadline are treated as absent on
/// read and reaped on the next write to the same key. Uses tokio time,
/// so tests can drive TTLs with the paused clock.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl InMemoryCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) entries.
    pub async fn entry_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Clears all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(&build_key(namespace, key))
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| CacheEntry {
                value: e.value.clone(),
                version: e.version,
            });
        Ok(entry)
    }

    async fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let full_key = build_key(namespace, key);
        let now = Instant::now();

        let version = match entries.get(&full_key) {
            Some(existing) if existing.expires_at > now => existing.version + 1,
            _ => 1,
        };
        entries.insert(
            full_key,
            StoredEntry {
                value,
                version,
                expires_at: now + ttl,
            },
        );
        Ok(version)
    }

    async fn put_versioned(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        expected_version: u64,
        ttl: Duration,
    ) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let full_key = build_key(namespace, key);
        let now = Instant::now();

        let actual = match entries.get(&full_key) {
            Some(existing) if existing.expires_at > now => existing.version,
            _ => VERSION_NONE,
        };
        if actual != expected_version {
            return Err(TrackingError::VersionConflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        entries.insert(
            full_key,
            StoredEntry {
                value,
                version,
                expires_at: now + ttl,
            },
        );
        Ok(version)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.entries.write().await.remove(&build_key(namespace, key));
        Ok(())
    }
}
