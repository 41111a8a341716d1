//! Weighted fusion of the individual recommendation strategies

use matching_common::models::{Location, MatchType, RecommendationResult};
use matching_common::Result;
use rand::seq::IteratorRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use crate::db::InteractionRepository;
use crate::services::location_filter::DEFAULT_MAX_DISTANCE_KM;
use crate::services::similarity::rank;
use crate::services::{LocationFilter, RecommendationCache, SimilarityEngine};

pub const TAG_WEIGHT: f32 = 0.4;
pub const COLLABORATIVE_WEIGHT: f32 = 0.3;
pub const LOCATION_WEIGHT: f32 = 0.2;
pub const RANDOM_WEIGHT: f32 = 0.1;

/// Raw score of an exploration pick before weighting
pub const RANDOM_BASE_SCORE: f32 = 0.1;

pub const HYBRID_REASON: &str = "hybrid recommendation algorithm";

/// Pick up to `count` users from `pool` uniformly, never `user_id`
pub fn sample_exploration<R: Rng + ?Sized>(
    user_id: Uuid,
    pool: &BTreeSet<Uuid>,
    count: usize,
    rng: &mut R,
) -> Vec<Uuid> {
    pool.iter()
        .copied()
        .filter(|candidate| *candidate != user_id)
        .choose_multiple(rng, count)
}

/// Exploration picks as random-strategy results
pub fn exploration_results(picks: Vec<Uuid>) -> Vec<RecommendationResult> {
    picks
        .into_iter()
        .map(|user_id| {
            RecommendationResult::new(user_id, RANDOM_BASE_SCORE, MatchType::Random, "random exploration")
                .with_metadata("random", true)
        })
        .collect()
}

/// Sum weighted strategy scores per candidate and keep the best `count`
///
/// Metadata comes from the candidate's first contribution, in the order the
/// strategies are given, plus the list of contributing strategies.
pub fn merge_weighted(
    strategies: &[(f32, Vec<RecommendationResult>)],
    count: usize,
) -> Vec<RecommendationResult> {
    struct Merged<'a> {
        user_id: Uuid,
        score: f64,
        first: &'a RecommendationResult,
        strategies: Vec<MatchType>,
    }

    let mut order: Vec<Uuid> = Vec::new();
    let mut merged: HashMap<Uuid, Merged<'_>> = HashMap::new();

    for (weight, results) in strategies {
        for result in results {
            let entry = merged.entry(result.user_id).or_insert_with(|| {
                order.push(result.user_id);
                Merged {
                    user_id: result.user_id,
                    score: 0.0,
                    first: result,
                    strategies: Vec::new(),
                }
            });
            entry.score += f64::from(result.score) * f64::from(*weight);
            if !entry.strategies.contains(&result.match_type) {
                entry.strategies.push(result.match_type);
            }
        }
    }

    let mut ranked: Vec<Merged<'_>> = order.iter().filter_map(|id| merged.remove(id)).collect();
    ranked.sort_by(|a, b| rank(a.score, b.score, a.user_id, b.user_id));

    ranked
        .into_iter()
        .take(count)
        .map(|m| {
            let mut result = RecommendationResult::new(m.user_id, m.score as f32, MatchType::Hybrid, HYBRID_REASON);
            result.metadata = m.first.metadata.clone();
            let labels: Vec<Value> = m
                .strategies
                .iter()
                .map(|t| Value::String(t.as_str().to_string()))
                .collect();
            result.with_metadata("strategies", labels)
        })
        .collect()
}

/// Runs every strategy concurrently and fuses the results
#[derive(Clone)]
pub struct HybridScoreAggregator {
    similarity: SimilarityEngine,
    location: LocationFilter,
    interactions: InteractionRepository,
    cache: RecommendationCache,
}

impl HybridScoreAggregator {
    pub fn new(
        similarity: SimilarityEngine,
        location: LocationFilter,
        interactions: InteractionRepository,
        cache: RecommendationCache,
    ) -> Self {
        Self {
            similarity,
            location,
            interactions,
            cache,
        }
    }

    /// Hybrid list computed fresh (no cache)
    pub async fn hybrid(
        &self,
        user_id: Uuid,
        location: Option<&Location>,
        count: usize,
    ) -> Result<Vec<RecommendationResult>> {
        let location_results = async {
            match location {
                Some(location) => {
                    self.location
                        .location_based(user_id, location, DEFAULT_MAX_DISTANCE_KM, count)
                        .await
                }
                None => Ok(Vec::new()),
            }
        };
        let random_results = async {
            let pool = self.interactions.users_with_ratings().await?;
            let picks = sample_exploration(user_id, &pool, count / 4, &mut rand::thread_rng());
            Ok::<_, matching_common::Error>(exploration_results(picks))
        };

        let (tag_based, collaborative, location_based, random) = tokio::try_join!(
            self.similarity.tag_based(user_id, count),
            self.similarity.collaborative(user_id, count),
            location_results,
            random_results,
        )?;

        debug!(
            "Hybrid inputs for {}: tag={} cf={} location={} random={}",
            user_id,
            tag_based.len(),
            collaborative.len(),
            location_based.len(),
            random.len()
        );

        Ok(merge_weighted(
            &[
                (TAG_WEIGHT, tag_based),
                (COLLABORATIVE_WEIGHT, collaborative),
                (LOCATION_WEIGHT, location_based),
                (RANDOM_WEIGHT, random),
            ],
            count,
        ))
    }

    /// Cached hybrid recommendations
    ///
    /// A hit returns the first `count` cached entries whatever location the
    /// cached list was computed with; a miss computes and writes through.
    pub async fn recommendations_for(
        &self,
        user_id: Uuid,
        location: Option<&Location>,
        count: usize,
    ) -> Result<Vec<RecommendationResult>> {
        if let Some(mut cached) = self.cache.recommendations(user_id).await? {
            cached.truncate(count);
            return Ok(cached);
        }

        let results = self.hybrid(user_id, location, count).await?;
        self.cache.store_recommendations(user_id, &results).await?;
        Ok(results)
    }
}
