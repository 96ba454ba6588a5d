//! Shared response cache for the tour feed proxy.
//!
//! Entries are fresh for `max_age`, then servable-stale for
//! `stale_while_revalidate` while a background refresh runs. Anything older
//! is evicted, on read for its own key and on every write for the rest of
//! the map. Writes are whole-entry overwrites (last writer wins).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use islandhop_core::FilterMode;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: String,
    pub path: String,
    pub client_id: String,
    pub filter_mode: FilterMode,
    pub filter_value: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
    pub stale_while_revalidate: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { max_age: Duration::from_secs(300), stale_while_revalidate: Duration::from_secs(60) }
    }
}

impl CachePolicy {
    pub fn from_secs(max_age_secs: u64, stale_while_revalidate_secs: u64) -> Self {
        Self {
            max_age: Duration::from_secs(max_age_secs),
            stale_while_revalidate: Duration::from_secs(stale_while_revalidate_secs),
        }
    }

    /// `Cache-Control` directive advertised on cacheable responses.
    pub fn retention(&self) -> Duration {
        self.max_age + self.stale_while_revalidate
    }

    pub fn header_value(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age.as_secs(),
            self.stale_while_revalidate.as_secs()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(CacheEntry),
    Stale(CacheEntry),
    Miss,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> CacheLookup;
    async fn store(&self, key: CacheKey, entry: CacheEntry);
    async fn len(&self) -> usize;
}

#[derive(Debug)]
struct StoredEntry {
    entry: CacheEntry,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct InMemoryCacheStore {
    policy: CachePolicy,
    entries: RwLock<HashMap<CacheKey, StoredEntry>>,
}

impl InMemoryCacheStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy, entries: RwLock::new(HashMap::new()) }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let expired_at = {
            let entries = self.entries.read().await;
            let Some(stored) = entries.get(key) else {
                return CacheLookup::Miss;
            };

            let age = stored.stored_at.elapsed();
            if age < self.policy.max_age {
                return CacheLookup::Fresh(stored.entry.clone());
            }
            if age < self.policy.retention() {
                return CacheLookup::Stale(stored.entry.clone());
            }
            stored.stored_at
        };

        let mut entries = self.entries.write().await;
        // A concurrent refresh may have replaced the entry since the read lock was released.
        if entries.get(key).is_some_and(|stored| stored.stored_at == expired_at) {
            entries.remove(key);
        }
        CacheLookup::Miss
    }

    async fn store(&self, key: CacheKey, entry: CacheEntry) {
        let retention = self.policy.retention();
        let mut entries = self.entries.write().await;
        entries.retain(|_, stored| stored.stored_at.elapsed() < retention);
        entries.insert(key, StoredEntry { entry, stored_at: Instant::now() });
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
