//! matching-service library
//!
//! Tag affinity, interaction history and match lifecycle behind an axum
//! router, plus the hybrid recommendation engine that reads them.

use axum::Router;
use matching_common::cache::CacheStore;
use matching_common::db::init::load_setting;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;

pub use error::{ApiError, ApiResult};
pub use services::{CacheTtls, Services};

/// Request defaults read from the runtime `settings` table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestDefaults {
    pub recommendation_count: usize,
    pub max_distance_km: f64,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            recommendation_count: 20,
            max_distance_km: services::location_filter::DEFAULT_MAX_DISTANCE_KM,
        }
    }
}

impl RequestDefaults {
    pub async fn load(pool: &SqlitePool) -> matching_common::Result<Self> {
        let fallback = Self::default();
        Ok(Self {
            recommendation_count: load_setting(pool, "recommendation_default_count", fallback.recommendation_count)
                .await?,
            max_distance_km: load_setting(pool, "location_default_max_distance_km", fallback.max_distance_km).await?,
        })
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub services: Services,
    pub defaults: RequestDefaults,
}

impl AppState {
    pub fn new(db: SqlitePool, cache: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        let services = Services::new(db.clone(), cache, ttls);
        Self {
            db,
            services,
            defaults: RequestDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Build application router
///
/// `/health*` needs no caller identity; every other route extracts
/// [`api::CallerId`] from `X-User-Id`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::recommendation_routes())
        .merge(api::interaction_routes())
        .merge(api::match_routes())
        .merge(api::tag_routes())
        .merge(api::user_tag_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
