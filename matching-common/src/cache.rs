//! Key-value cache store contract and its backends
//!
//! Two interchangeable backends satisfy [`CacheStore`]:
//! - [`MemoryCache`]: per-process map, lost on restart
//! - [`SqliteCache`]: `cache_entries` table in the shared database, visible to
//!   every service instance that opens the same file
//!
//! The backend is chosen from configuration at composition time
//! ([`build_cache_store`]). Values are opaque strings; callers own encoding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{time, Result};

/// Cache capability: get / set-with-TTL / delete
///
/// Eventually consistent; no transactional guarantee between a read and a
/// later write.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove `key` (no-op if absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Build the configured cache backend
pub fn build_cache_store(backend: CacheBackend, pool: &SqlitePool) -> Arc<dyn CacheStore> {
    match backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Sqlite => Arc::new(SqliteCache::new(pool.clone())),
    }
}

/// Periodically purge expired entries from `store`
///
/// Entries whose key is never read again are otherwise kept forever. A failed
/// purge is logged and retried on the next tick.
pub fn spawn_purge_task(store: Arc<dyn CacheStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!("Purged {} expired cache entries", removed),
                Err(e) => warn!("Cache purge failed: {}", e),
            }
        }
    })
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache backend
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(Instant::now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: evict lazily
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(Instant::now())) {
            entries.remove(key);
            debug!("Evicted expired cache entry '{}'", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}

/// Shared cache backend stored in the `cache_entries` table
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((value, expires_at)) if expires_at > time::to_millis(time::now()) => Ok(Some(value)),
            Some(_) => {
                self.delete(key).await?;
                debug!("Evicted expired cache entry '{}'", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| time::now().checked_add_signed(ttl))
            .map(time::to_millis)
            .unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(time::to_millis(time::now()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_cache() -> SqliteCache {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init::create_cache_entries_table(&pool)
            .await
            .expect("Failed to create cache table");
        SqliteCache::new(pool)
    }

    async fn exercise_contract(store: &dyn CacheStore) {
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

        store.set("k", "v2".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Deleting a missing key is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_cache_contract() {
        exercise_contract(&MemoryCache::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_cache_contract() {
        exercise_contract(&sqlite_cache().await).await;
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("short", "x".to_string(), Duration::from_millis(20)).await.unwrap();
        cache.set("long", "y".to_string(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("y"));
        assert_eq!(cache.len().await, 1, "expired entry should be evicted on read");
    }

    #[tokio::test]
    async fn test_memory_cache_purge() {
        let cache = MemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_millis(1)).await.unwrap();
        cache.set("b", "2".to_string(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(!cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_sqlite_cache_expiry() {
        let cache = sqlite_cache().await;
        cache.set("short", "x".to_string(), Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.purge_expired().await.unwrap(), 0, "expired row removed on read");
    }

    #[test]
    fn test_backend_config_labels() {
        let backend: CacheBackend = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(backend, CacheBackend::Sqlite);
        assert_eq!(CacheBackend::default(), CacheBackend::Memory);
    }

    async fn exercise_unbounded_ttl(store: &dyn CacheStore) {
        store.set("forever", "v".to_string(), Duration::MAX).await.unwrap();
        assert_eq!(store.get("forever").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        exercise_unbounded_ttl(&MemoryCache::new()).await;
        exercise_unbounded_ttl(&sqlite_cache().await).await;

        // Largest value the TOML section accepts
        let ttl = Duration::from_secs(i64::MAX as u64);
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_purge_task_clears_unread_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("stale", "x".to_string(), Duration::from_millis(1)).await.unwrap();
        cache.set("fresh", "y".to_string(), Duration::from_secs(60)).await.unwrap();

        let handle = spawn_purge_task(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("fresh").await.unwrap().as_deref(), Some("y"));
    }
}
