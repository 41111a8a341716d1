//! Proximity recommendations from recent interactions
//!
//! Candidates are the targets of the user's recent interactions, scored by
//! interaction type. Distance is reported but does not scale the score;
//! the radius is carried in metadata for eligibility checks upstream.

use matching_common::models::{InteractionType, Location, MatchType, RecommendationResult, UserInteraction};
use matching_common::{time, Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::InteractionRepository;
use crate::services::similarity::rank;

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

/// How far back interactions are considered
pub const LOOKBACK_DAYS: i64 = 30;

/// Most recent interactions inspected per request
pub const MAX_RECENT_INTERACTIONS: usize = 100;

/// Candidates must score strictly above this
pub const MIN_LOCATION_SCORE: f32 = 0.3;

/// Proximity signal carried by one interaction type
pub fn interaction_location_score(interaction_type: InteractionType) -> f32 {
    match interaction_type {
        InteractionType::Follow => 0.9,
        InteractionType::Like => 0.8,
        InteractionType::SendMessage => 0.7,
        InteractionType::ViewProfile => 0.3,
        _ => 0.5,
    }
}

/// Best interaction score per target above the threshold, best first
pub fn score_recent_interactions(user_id: Uuid, interactions: &[UserInteraction]) -> Vec<(Uuid, f32)> {
    let mut best: HashMap<Uuid, f32> = HashMap::new();
    for interaction in interactions {
        if interaction.target_user_id == user_id {
            continue;
        }
        let score = interaction_location_score(interaction.interaction_type);
        if score <= MIN_LOCATION_SCORE {
            continue;
        }
        let entry = best.entry(interaction.target_user_id).or_insert(score);
        *entry = entry.max(score);
    }

    let mut scored: Vec<(Uuid, f32)> = best.into_iter().collect();
    scored.sort_by(|a, b| rank(f64::from(a.1), f64::from(b.1), a.0, b.0));
    scored
}

/// Reject coordinates outside the valid latitude/longitude ranges
pub fn validate_location(location: &Location) -> Result<()> {
    if !(-90.0..=90.0).contains(&location.latitude) {
        return Err(Error::validation("lat", "latitude must be within [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&location.longitude) {
        return Err(Error::validation("lon", "longitude must be within [-180, 180]"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LocationFilter {
    interactions: InteractionRepository,
}

impl LocationFilter {
    pub fn new(interactions: InteractionRepository) -> Self {
        Self { interactions }
    }

    pub async fn location_based(
        &self,
        user_id: Uuid,
        location: &Location,
        max_distance_km: f64,
        count: usize,
    ) -> Result<Vec<RecommendationResult>> {
        validate_location(location)?;
        if max_distance_km.is_nan() || max_distance_km <= 0.0 {
            return Err(Error::validation("max_distance_km", "must be positive"));
        }

        let recent = self
            .interactions
            .recent_since(user_id, time::days_ago(LOOKBACK_DAYS), MAX_RECENT_INTERACTIONS)
            .await?;

        let city = location.city.clone().unwrap_or_else(|| "unknown".to_string());
        let province = location.province.clone().unwrap_or_else(|| "unknown".to_string());

        Ok(score_recent_interactions(user_id, &recent)
            .into_iter()
            .take(count)
            .map(|(candidate, score)| {
                RecommendationResult::new(candidate, score, MatchType::LocationBased, "location proximity")
                    .with_metadata("distance", Value::Null)
                    .with_metadata("max_distance_km", max_distance_km)
                    .with_metadata("city", city.clone())
                    .with_metadata("province", province.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_common::db::init::init_memory_database;

    #[test]
    fn test_type_weights() {
        assert_eq!(interaction_location_score(InteractionType::Follow), 0.9);
        assert_eq!(interaction_location_score(InteractionType::Like), 0.8);
        assert_eq!(interaction_location_score(InteractionType::SendMessage), 0.7);
        assert_eq!(interaction_location_score(InteractionType::ViewProfile), 0.3);
        assert_eq!(interaction_location_score(InteractionType::JoinGroup), 0.5);
    }

    #[test]
    fn test_view_only_targets_are_dropped_and_best_type_wins() {
        let me = Uuid::new_v4();
        let (viewed, liked) = (Uuid::new_v4(), Uuid::new_v4());
        let interactions = vec![
            UserInteraction::new(me, viewed, InteractionType::ViewProfile, 0.0),
            UserInteraction::new(me, liked, InteractionType::Comment, 1.0),
            UserInteraction::new(me, liked, InteractionType::Follow, 0.0),
            UserInteraction::new(me, me, InteractionType::Like, 5.0),
        ];

        let scored = score_recent_interactions(me, &interactions);
        assert_eq!(scored, vec![(liked, 0.9)]);
    }

    #[test]
    fn test_validate_location_ranges() {
        assert!(validate_location(&Location::new(31.2, 121.5)).is_ok());
        assert!(validate_location(&Location::new(91.0, 0.0)).is_err());
        assert!(validate_location(&Location::new(0.0, -181.0)).is_err());
    }

    #[tokio::test]
    async fn test_location_based_reads_last_30_days_only() {
        let pool = init_memory_database().await.expect("in-memory database");
        let repo = InteractionRepository::new(pool);
        let me = Uuid::new_v4();
        let (old, recent) = (Uuid::new_v4(), Uuid::new_v4());

        let mut stale = UserInteraction::new(me, old, InteractionType::Follow, 0.0);
        stale.created_at = time::days_ago(40);
        repo.insert(&stale).await.unwrap();
        repo.insert(&UserInteraction::new(me, recent, InteractionType::Like, 4.0)).await.unwrap();

        let mut here = Location::new(31.2304, 121.4737);
        here.city = Some("Shanghai".to_string());

        let filter = LocationFilter::new(repo);
        let results = filter.location_based(me, &here, DEFAULT_MAX_DISTANCE_KM, 20).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, recent);
        assert_eq!(results[0].score, 0.8);
        assert_eq!(results[0].match_type, MatchType::LocationBased);
        assert_eq!(results[0].metadata["city"], "Shanghai");
        assert_eq!(results[0].metadata["province"], "unknown");
        assert!(results[0].metadata["distance"].is_null());
    }
}
