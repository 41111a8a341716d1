//! Tag-overlap and collaborative-filtering similarity
//!
//! The scoring math lives in pure functions over already-fetched data;
//! [`SimilarityEngine`] only gathers inputs and shapes results.

use matching_common::models::{MatchType, RecommendationResult};
use matching_common::Result;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::interactions::RatingMap;
use crate::db::user_tags::SharedTag;
use crate::db::{InteractionRepository, UserTagRepository};

/// Scale applied to each shared tag's weight ratio
pub const TAG_SIMILARITY_FACTOR: f64 = 0.8;

/// Neighbors must correlate above this to contribute
pub const MIN_NEIGHBOR_SIMILARITY: f64 = 0.1;

/// Most-similar neighbors consulted per prediction
pub const MAX_NEIGHBORS: usize = 50;

/// Fewer commonly rated targets than this gives similarity 0
pub const MIN_COMMON_RATINGS: usize = 2;

const DENOMINATOR_EPSILON: f64 = 1e-10;

/// Ratings are normalized into [0, 1] by this
const RATING_SCALE: f64 = 5.0;

/// Similarity contributed by one shared tag
///
/// `min / max * 0.8`; two zero weights contribute nothing.
pub fn tag_weight_similarity(own: f32, other: f32) -> f64 {
    let (own, other) = (f64::from(own), f64::from(other));
    let max = own.max(other);
    if max <= 0.0 {
        return 0.0;
    }
    own.min(other) / max * TAG_SIMILARITY_FACTOR
}

/// Accumulated tag similarity toward one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct TagOverlap {
    pub user_id: Uuid,
    pub score: f64,
    pub common_tags: usize,
}

/// Sum per-tag similarity per candidate, best first
pub fn score_tag_overlap(shared: &[SharedTag]) -> Vec<TagOverlap> {
    let mut by_user: HashMap<Uuid, TagOverlap> = HashMap::new();
    for pair in shared {
        let entry = by_user.entry(pair.other_user_id).or_insert_with(|| TagOverlap {
            user_id: pair.other_user_id,
            score: 0.0,
            common_tags: 0,
        });
        entry.score += tag_weight_similarity(pair.own_weight, pair.other_weight);
        entry.common_tags += 1;
    }

    let mut overlaps: Vec<TagOverlap> = by_user.into_values().collect();
    overlaps.sort_by(|a, b| rank(a.score, b.score, a.user_id, b.user_id));
    overlaps
}

/// Pearson correlation over the targets both maps rated
///
/// Degenerate inputs (fewer than two common targets, zero variance) give 0.
pub fn pearson_correlation(a: &RatingMap, b: &RatingMap) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(target, x)| b.get(target).map(|y| (*x, *y)))
        .collect();
    if pairs.len() < MIN_COMMON_RATINGS {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();
    if denominator.is_nan() || denominator.abs() < DENOMINATOR_EPSILON {
        return 0.0;
    }

    numerator / denominator
}

/// Accumulated neighbor evidence for one unrated target
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub user_id: Uuid,
    /// Sum of `similarity * rating` over contributing neighbors
    pub predicted_rating: f64,
}

/// Neighbors of `user_id` above the similarity threshold, best first, unbounded
pub fn similar_users(user_id: Uuid, all_ratings: &HashMap<Uuid, RatingMap>) -> Vec<(Uuid, f64)> {
    let Some(own) = all_ratings.get(&user_id) else {
        return Vec::new();
    };

    let mut neighbors: Vec<(Uuid, f64)> = all_ratings
        .iter()
        .filter(|(other, _)| **other != user_id)
        .map(|(other, ratings)| (*other, pearson_correlation(own, ratings)))
        .filter(|(_, similarity)| *similarity > MIN_NEIGHBOR_SIMILARITY)
        .collect();
    neighbors.sort_by(|a, b| rank(a.1, b.1, a.0, b.0));
    neighbors
}

/// Predict ratings for targets the user has not rated, best first
///
/// `neighbors` should come from [`similar_users`]; only the first
/// [`MAX_NEIGHBORS`] are consulted. The user is never predicted for itself.
pub fn predict_ratings(
    user_id: Uuid,
    neighbors: &[(Uuid, f64)],
    all_ratings: &HashMap<Uuid, RatingMap>,
) -> Vec<Prediction> {
    let Some(own) = all_ratings.get(&user_id) else {
        return Vec::new();
    };

    let mut accumulated: HashMap<Uuid, f64> = HashMap::new();
    for (neighbor, similarity) in neighbors.iter().take(MAX_NEIGHBORS) {
        let Some(ratings) = all_ratings.get(neighbor) else {
            continue;
        };
        for (target, rating) in ratings {
            if *target == user_id || own.contains_key(target) {
                continue;
            }
            *accumulated.entry(*target).or_default() += similarity * rating;
        }
    }

    let mut predictions: Vec<Prediction> = accumulated
        .into_iter()
        .map(|(user_id, predicted_rating)| Prediction {
            user_id,
            predicted_rating,
        })
        .collect();
    predictions.sort_by(|a, b| rank(a.predicted_rating, b.predicted_rating, a.user_id, b.user_id));
    predictions
}

/// Descending by score, ascending by user id among equals
pub(crate) fn rank(score_a: f64, score_b: f64, id_a: Uuid, id_b: Uuid) -> Ordering {
    score_b.total_cmp(&score_a).then_with(|| id_a.cmp(&id_b))
}

/// Tag-based and collaborative-filtering recommendation strategies
#[derive(Clone)]
pub struct SimilarityEngine {
    user_tags: UserTagRepository,
    interactions: InteractionRepository,
}

impl SimilarityEngine {
    pub fn new(user_tags: UserTagRepository, interactions: InteractionRepository) -> Self {
        Self {
            user_tags,
            interactions,
        }
    }

    /// Users sharing the most (and most similarly weighted) tags
    pub async fn tag_based(&self, user_id: Uuid, count: usize) -> Result<Vec<RecommendationResult>> {
        let shared = self.user_tags.shared_tags(user_id).await?;

        Ok(score_tag_overlap(&shared)
            .into_iter()
            .take(count)
            .map(|overlap| {
                RecommendationResult::new(overlap.user_id, overlap.score as f32, MatchType::TagBased, "tag similarity")
                    .with_metadata("common_tags", overlap.common_tags)
                    .with_metadata("similarity_score", overlap.score)
            })
            .collect())
    }

    /// Targets rated highly by users whose ratings correlate with this user's
    pub async fn collaborative(&self, user_id: Uuid, count: usize) -> Result<Vec<RecommendationResult>> {
        let all_ratings = self.interactions.all_ratings().await?;
        if all_ratings.get(&user_id).map_or(true, |own| own.is_empty()) {
            return Ok(Vec::new());
        }

        let neighbors = similar_users(user_id, &all_ratings);
        let predictions = predict_ratings(user_id, &neighbors, &all_ratings);

        Ok(predictions
            .into_iter()
            .take(count)
            .map(|prediction| {
                RecommendationResult::new(
                    prediction.user_id,
                    (prediction.predicted_rating / RATING_SCALE) as f32,
                    MatchType::CollaborativeFiltering,
                    "collaborative filtering",
                )
                .with_metadata("similar_users", neighbors.len())
                .with_metadata("predicted_rating", prediction.predicted_rating)
            })
            .collect())
    }

    /// Pearson similarity between two users' rating histories
    pub async fn user_similarity(&self, user_a: Uuid, user_b: Uuid) -> Result<f64> {
        let (a, b) = tokio::try_join!(
            self.interactions.ratings_by_user(user_a),
            self.interactions.ratings_by_user(user_b)
        )?;
        Ok(pearson_correlation(&a, &b))
    }
}
