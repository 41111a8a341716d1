//! Recommendation endpoints
//!
//! Every route is scoped to the caller's own user id.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use matching_common::models::{Location, RecommendationResult};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::{resolve_count, CallerId};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Build a location from optional query coordinates
///
/// `None` when no coordinates were given; 400 when only one was.
fn query_location(
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    province: Option<String>,
) -> ApiResult<Option<Location>> {
    match (lat, lon) {
        (None, None) => Ok(None),
        (Some(latitude), Some(longitude)) => Ok(Some(Location {
            city,
            province,
            ..Location::new(latitude, longitude)
        })),
        _ => Err(ApiError::BadRequest("lat and lon must be given together".to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub count: Option<usize>,
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub province: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRecommendationQuery {
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub max_distance_km: Option<f64>,
    pub count: Option<usize>,
}

/// GET /recommendations/:user_id
pub async fn get_recommendations(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<Vec<RecommendationResult>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, state.defaults.recommendation_count)?;
    let location = query_location(query.lat, query.lon, query.city, query.province)?;

    let results = state
        .services
        .recommendations
        .recommendations_for(user_id, location.as_ref(), count)
        .await?;
    debug!("Returning {} recommendations for {}", results.len(), user_id);
    Ok(Json(results))
}

/// GET /recommendations/:user_id/tag-based
pub async fn get_tag_based(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<Vec<RecommendationResult>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, state.defaults.recommendation_count)?;
    Ok(Json(state.services.similarity.tag_based(user_id, count).await?))
}

/// GET /recommendations/:user_id/collaborative
pub async fn get_collaborative(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<Vec<RecommendationResult>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, state.defaults.recommendation_count)?;
    Ok(Json(state.services.similarity.collaborative(user_id, count).await?))
}

/// GET /recommendations/:user_id/location
pub async fn get_location_based(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<LocationRecommendationQuery>,
) -> ApiResult<Json<Vec<RecommendationResult>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, state.defaults.recommendation_count)?;
    let location = query_location(query.lat, query.lon, query.city, query.province)?
        .ok_or_else(|| ApiError::BadRequest("lat and lon are required".to_string()))?;
    let max_distance_km = query.max_distance_km.unwrap_or(state.defaults.max_distance_km);

    let results = state
        .services
        .location
        .location_based(user_id, &location, max_distance_km, count)
        .await?;
    Ok(Json(results))
}

pub fn recommendation_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations/:user_id", get(get_recommendations))
        .route("/recommendations/:user_id/tag-based", get(get_tag_based))
        .route("/recommendations/:user_id/collaborative", get(get_collaborative))
        .route("/recommendations/:user_id/location", get(get_location_based))
}
