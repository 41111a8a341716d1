//! Tag lifecycle and per-user tag affinity
//!
//! Every affinity write invalidates the user's cached recommendations and
//! cached tag list.

use matching_common::models::{Tag, TagCategory, UserTag};
use matching_common::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{AttachOutcome, TagRepository, UserTagRepository};
use crate::services::RecommendationCache;

/// Popular tags are cached as one list of this length
const POPULAR_TAGS_CACHED: usize = 100;

/// Default weight of a freshly attached tag
pub const DEFAULT_TAG_WEIGHT: f32 = 1.0;

#[derive(Clone)]
pub struct TagCatalog {
    tags: TagRepository,
    user_tags: UserTagRepository,
    cache: RecommendationCache,
}

impl TagCatalog {
    pub fn new(tags: TagRepository, user_tags: UserTagRepository, cache: RecommendationCache) -> Self {
        Self { tags, user_tags, cache }
    }

    pub async fn create_tag(&self, name: &str, description: &str, category: TagCategory) -> Result<Tag> {
        let name = validate_name(name)?;
        let description = validate_description(description)?;
        if self.tags.exists_by_name(name).await? {
            return Err(Error::validation("name", format!("tag '{}' already exists", name)));
        }

        let tag = Tag::new(name, description, category);
        self.tags.insert(&tag).await?;
        self.cache.invalidate_popular_tags().await?;
        info!("Created tag '{}' ({})", tag.name, tag.id);
        Ok(tag)
    }

    pub async fn update_tag(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        category: TagCategory,
    ) -> Result<Tag> {
        let name = validate_name(name)?;
        let description = validate_description(description)?;
        let mut tag = self
            .tags
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tag {}", id)))?;

        if let Some(other) = self.tags.get_by_name(name).await? {
            if other.id != id {
                return Err(Error::validation("name", format!("tag '{}' already exists", name)));
            }
        }

        tag.update_info(name, description, category);
        self.tags.update(&tag).await?;
        self.cache.invalidate_popular_tags().await?;
        info!("Updated tag {}", id);
        Ok(tag)
    }

    /// Delete an unused tag; false if it does not exist
    pub async fn delete_tag(&self, id: Uuid) -> Result<bool> {
        if self.tags.get(id).await?.is_none() {
            return Ok(false);
        }

        let holders = self.tags.active_reference_count(id).await?;
        if holders > 0 {
            return Err(Error::validation(
                "tag_id",
                format!("tag {} is still held by {} users", id, holders),
            ));
        }

        let deleted = self.tags.delete(id).await?;
        self.cache.invalidate_popular_tags().await?;
        info!("Deleted tag {}", id);
        Ok(deleted)
    }

    pub async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
        self.tags.get(id).await
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.tags.get_by_name(name).await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.tags.list_active().await
    }

    pub async fn tags_by_category(&self, category: TagCategory) -> Result<Vec<Tag>> {
        self.tags.by_category(category).await
    }

    pub async fn search_tags(&self, keyword: &str, count: usize) -> Result<Vec<Tag>> {
        self.tags.search(keyword.trim(), count).await
    }

    /// Most used active tags, served from cache when possible
    pub async fn popular_tags(&self, count: usize) -> Result<Vec<Tag>> {
        if count > POPULAR_TAGS_CACHED {
            return self.tags.popular(count).await;
        }

        if let Some(mut cached) = self.cache.popular_tags().await? {
            cached.truncate(count);
            return Ok(cached);
        }

        let mut popular = self.tags.popular(POPULAR_TAGS_CACHED).await?;
        self.cache.store_popular_tags(&popular).await?;
        popular.truncate(count);
        Ok(popular)
    }

    /// Attach or re-weight a tag for a user
    pub async fn attach_tag(&self, user_id: Uuid, tag_id: Uuid, weight: f32) -> Result<UserTag> {
        let (user_tag, outcome) = self.user_tags.attach(user_id, tag_id, weight).await?;
        self.cache.invalidate_user(user_id).await?;

        match outcome {
            AttachOutcome::Created => info!("User {} attached tag {}", user_id, tag_id),
            AttachOutcome::Reactivated => info!("User {} re-attached tag {}", user_id, tag_id),
            AttachOutcome::Updated => debug!("User {} re-weighted tag {} to {}", user_id, tag_id, user_tag.weight),
        }
        Ok(user_tag)
    }

    /// Remove a tag from a user; a missing relation is a no-op
    pub async fn detach_tag(&self, user_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let removed = self.user_tags.detach(user_id, tag_id).await?;
        if removed {
            self.cache.invalidate_user(user_id).await?;
            info!("User {} detached tag {}", user_id, tag_id);
        }
        Ok(removed)
    }

    pub async fn update_user_tag_weight(&self, user_id: Uuid, tag_id: Uuid, weight: f32) -> Result<UserTag> {
        let user_tag = self
            .user_tags
            .update_weight(user_id, tag_id, weight)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tag {} for user {}", tag_id, user_id)))?;
        self.cache.invalidate_user(user_id).await?;
        Ok(user_tag)
    }

    /// A user's active tags, strongest first (cached)
    pub async fn user_tags(&self, user_id: Uuid) -> Result<Vec<UserTag>> {
        if let Some(cached) = self.cache.user_tags(user_id).await? {
            return Ok(cached);
        }

        let tags = self.user_tags.active_by_user(user_id).await?;
        self.cache.store_user_tags(user_id, &tags, None).await?;
        Ok(tags)
    }

    pub async fn user_tag(&self, user_id: Uuid, tag_id: Uuid) -> Result<Option<UserTag>> {
        self.user_tags.get(user_id, tag_id).await
    }

    /// Active holders of a tag
    pub async fn tag_holders(&self, tag_id: Uuid) -> Result<Vec<UserTag>> {
        self.user_tags.by_tag(tag_id).await
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    if name.chars().count() > 50 {
        return Err(Error::validation("name", "must be at most 50 characters"));
    }
    Ok(name)
}

fn validate_description(description: &str) -> Result<&str> {
    let description = description.trim();
    if description.chars().count() > 200 {
        return Err(Error::validation("description", "must be at most 200 characters"));
    }
    Ok(description)
}
