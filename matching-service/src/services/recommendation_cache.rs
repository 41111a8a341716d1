//! Typed memoization over a [`CacheStore`]
//!
//! Values are stored as JSON. An entry that no longer decodes is deleted
//! and reported as a miss; callers never see the decode error.

use matching_common::cache::CacheStore;
use matching_common::config::CacheConfig;
use matching_common::models::{RecommendationResult, Tag, UserTag};
use matching_common::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const POPULAR_TAGS_KEY: &str = "popular_tags";

pub fn recommendations_key(user_id: Uuid) -> String {
    format!("recommendations:{}", user_id)
}

pub fn user_tags_key(user_id: Uuid) -> String {
    format!("user_tags:{}", user_id)
}

/// Entry lifetimes per cached value kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub recommendations: Duration,
    pub popular_tags: Duration,
    pub user_tags: Duration,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            recommendations: config.recommendations_ttl(),
            popular_tags: config.popular_tags_ttl(),
            user_tags: config.user_tags_ttl(),
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

/// Recommendation, popular-tag and user-tag memoization
#[derive(Clone)]
pub struct RecommendationCache {
    store: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl RecommendationCache {
    pub fn new(store: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self { store, ttls }
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    pub async fn recommendations(&self, user_id: Uuid) -> Result<Option<Vec<RecommendationResult>>> {
        self.get_json(&recommendations_key(user_id)).await
    }

    pub async fn store_recommendations(&self, user_id: Uuid, results: &[RecommendationResult]) -> Result<()> {
        self.set_json(&recommendations_key(user_id), &results, self.ttls.recommendations)
            .await
    }

    pub async fn invalidate_recommendations(&self, user_id: Uuid) -> Result<()> {
        self.store.delete(&recommendations_key(user_id)).await
    }

    pub async fn popular_tags(&self) -> Result<Option<Vec<Tag>>> {
        self.get_json(POPULAR_TAGS_KEY).await
    }

    pub async fn store_popular_tags(&self, tags: &[Tag]) -> Result<()> {
        self.set_json(POPULAR_TAGS_KEY, &tags, self.ttls.popular_tags).await
    }

    pub async fn invalidate_popular_tags(&self) -> Result<()> {
        self.store.delete(POPULAR_TAGS_KEY).await
    }

    pub async fn user_tags(&self, user_id: Uuid) -> Result<Option<Vec<UserTag>>> {
        self.get_json(&user_tags_key(user_id)).await
    }

    /// Cache a user's tag list; `ttl` overrides the configured lifetime
    pub async fn store_user_tags(&self, user_id: Uuid, tags: &[UserTag], ttl: Option<Duration>) -> Result<()> {
        self.set_json(&user_tags_key(user_id), &tags, ttl.unwrap_or(self.ttls.user_tags))
            .await
    }

    pub async fn invalidate_user_tags(&self, user_id: Uuid) -> Result<()> {
        self.store.delete(&user_tags_key(user_id)).await
    }

    /// Drop everything derived from a user's tags
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<()> {
        self.invalidate_recommendations(user_id).await?;
        self.invalidate_user_tags(user_id).await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            debug!("Cache miss: {}", key);
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry '{}': {}", key, e);
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, raw, ttl).await
    }
}
