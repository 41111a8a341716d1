//! Matching components
//!
//! Each component owns the repositories it reads and writes; the only shared
//! piece is the [`RecommendationCache`], which writers invalidate and the
//! hybrid aggregator reads through.

pub mod hybrid;
pub mod interaction_ledger;
pub mod location_filter;
pub mod match_lifecycle;
pub mod recommendation_cache;
pub mod similarity;
pub mod tag_catalog;

pub use hybrid::HybridScoreAggregator;
pub use interaction_ledger::{InteractionLedger, InteractionStats};
pub use location_filter::LocationFilter;
pub use match_lifecycle::MatchLifecycleManager;
pub use recommendation_cache::{CacheTtls, RecommendationCache};
pub use similarity::SimilarityEngine;
pub use tag_catalog::TagCatalog;

use matching_common::cache::CacheStore;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::{InteractionRepository, MatchRepository, TagRepository, UserTagRepository};

/// Every component wired over one pool and one cache store
#[derive(Clone)]
pub struct Services {
    pub tags: TagCatalog,
    pub interactions: InteractionLedger,
    pub similarity: SimilarityEngine,
    pub location: LocationFilter,
    pub recommendations: HybridScoreAggregator,
    pub matches: MatchLifecycleManager,
    pub cache: RecommendationCache,
}

impl Services {
    pub fn new(pool: SqlitePool, store: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        let cache = RecommendationCache::new(store, ttls);

        let tag_repo = TagRepository::new(pool.clone());
        let user_tag_repo = UserTagRepository::new(pool.clone());
        let interaction_repo = InteractionRepository::new(pool.clone());
        let match_repo = MatchRepository::new(pool);

        let tags = TagCatalog::new(tag_repo, user_tag_repo.clone(), cache.clone());
        let interactions = InteractionLedger::new(interaction_repo.clone(), cache.clone());
        let similarity = SimilarityEngine::new(user_tag_repo, interaction_repo.clone());
        let location = LocationFilter::new(interaction_repo.clone());
        let recommendations =
            HybridScoreAggregator::new(similarity.clone(), location.clone(), interaction_repo, cache.clone());
        let matches = MatchLifecycleManager::new(match_repo, interactions.clone());

        Self {
            tags,
            interactions,
            similarity,
            location,
            recommendations,
            matches,
            cache,
        }
    }
}
