//! Append-only interaction log and the implicit ratings derived from it

use chrono::{DateTime, Utc};
use matching_common::models::{InteractionType, UserInteraction};
use matching_common::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::interactions::RatingMap;
use crate::db::InteractionRepository;
use crate::services::RecommendationCache;

const MAX_CONTEXT_CHARS: usize = 1000;
const MAX_METADATA_CHARS: usize = 2000;

/// Per-user interaction summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionStats {
    pub total_interactions: i64,
    pub interactions_by_type: BTreeMap<InteractionType, i64>,
    /// Mean of positive ratings, 0 when there are none
    pub average_rating: f64,
}

#[derive(Clone)]
pub struct InteractionLedger {
    repo: InteractionRepository,
    cache: RecommendationCache,
}

impl InteractionLedger {
    pub fn new(repo: InteractionRepository, cache: RecommendationCache) -> Self {
        Self { repo, cache }
    }

    /// Append an interaction (rating clamped to [0, 5])
    pub async fn record_interaction(
        &self,
        user_id: Uuid,
        target_user_id: Uuid,
        interaction_type: InteractionType,
        rating: f32,
        context: Option<String>,
    ) -> Result<UserInteraction> {
        let interaction =
            UserInteraction::new(user_id, target_user_id, interaction_type, rating).with_context(context);
        self.record(interaction).await
    }

    /// Append a fully built interaction
    pub async fn record(&self, interaction: UserInteraction) -> Result<UserInteraction> {
        if interaction
            .context
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_CONTEXT_CHARS)
        {
            return Err(Error::validation("context", format!("must be at most {} characters", MAX_CONTEXT_CHARS)));
        }
        if interaction
            .metadata
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_METADATA_CHARS)
        {
            return Err(Error::validation("metadata", format!("must be at most {} characters", MAX_METADATA_CHARS)));
        }

        self.repo.insert(&interaction).await?;
        self.after_commit(&interaction).await?;
        Ok(interaction)
    }

    /// Cache upkeep for an interaction another component wrote in its own transaction
    pub async fn after_commit(&self, interaction: &UserInteraction) -> Result<()> {
        self.cache.invalidate_recommendations(interaction.user_id).await?;
        debug!(
            "Recorded {} from {} to {} (rating {})",
            interaction.interaction_type.as_str(),
            interaction.user_id,
            interaction.target_user_id,
            interaction.rating
        );
        Ok(())
    }

    /// Rewrite the rating of an existing interaction
    pub async fn correct_rating(&self, interaction_id: Uuid, rating: f32) -> Result<UserInteraction> {
        let mut interaction = self
            .repo
            .get(interaction_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interaction {}", interaction_id)))?;

        interaction.update_rating(rating);
        self.repo.update_rating(interaction.id, interaction.rating).await?;
        self.cache.invalidate_recommendations(interaction.user_id).await?;

        info!("Corrected rating of interaction {} to {}", interaction.id, interaction.rating);
        Ok(interaction)
    }

    pub async fn get_interaction(&self, interaction_id: Uuid) -> Result<Option<UserInteraction>> {
        self.repo.get(interaction_id).await
    }

    /// Mean positive rating the user gave each target
    pub async fn user_ratings(&self, user_id: Uuid) -> Result<RatingMap> {
        self.repo.ratings_by_user(user_id).await
    }

    /// Users with at least one positive rating
    pub async fn users_with_ratings(&self) -> Result<BTreeSet<Uuid>> {
        self.repo.users_with_ratings().await
    }

    /// Every user's rating map, fetched in one query
    pub async fn all_user_ratings(&self) -> Result<HashMap<Uuid, RatingMap>> {
        self.repo.all_ratings().await
    }

    pub async fn interactions_for_user(&self, user_id: Uuid) -> Result<Vec<UserInteraction>> {
        self.repo.by_user(user_id).await
    }

    pub async fn interactions_by_type(
        &self,
        user_id: Uuid,
        interaction_type: InteractionType,
    ) -> Result<Vec<UserInteraction>> {
        self.repo.by_user_and_type(user_id, interaction_type).await
    }

    pub async fn interactions_for_pair(&self, user_id: Uuid, target_user_id: Uuid) -> Result<Vec<UserInteraction>> {
        self.repo.by_pair(user_id, target_user_id).await
    }

    pub async fn recent_interactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<UserInteraction>> {
        self.repo.recent_since(user_id, since, count).await
    }

    pub async fn interaction_stats(&self, user_id: Uuid) -> Result<InteractionStats> {
        let by_type = self.repo.counts_by_type(user_id).await?;
        let ratings = self.repo.ratings_by_user(user_id).await?;

        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.values().sum::<f64>() / ratings.len() as f64
        };

        Ok(InteractionStats {
            total_interactions: by_type.values().sum(),
            interactions_by_type: by_type,
            average_rating,
        })
    }
}
