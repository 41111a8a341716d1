//! Match endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use matching_common::models::{MatchStatus, MatchType, UserMatch};
use serde::Deserialize;
use uuid::Uuid;

use super::{resolve_count, CallerId};
use crate::db::MatchStats;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, DEFAULT_PAGE_SIZE};
use crate::AppState;

const DEFAULT_MIN_SCORE: f32 = 0.7;
const DEFAULT_HIGH_SCORE_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ProcessMatchRequest {
    pub matched_user_id: Uuid,
    pub score: f32,
    pub match_type: MatchType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: MatchStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatchListQuery {
    pub status: Option<MatchStatus>,
    pub match_type: Option<MatchType>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HighScoreQuery {
    pub min_score: Option<f32>,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub count: Option<usize>,
}

/// POST /matches
///
/// Creates a pending match from the caller, or refreshes the score of the
/// existing one.
pub async fn process_match(
    State(state): State<AppState>,
    caller: CallerId,
    Json(request): Json<ProcessMatchRequest>,
) -> ApiResult<Json<UserMatch>> {
    if !(0.0..=1.0).contains(&request.score) {
        return Err(ApiError::BadRequest("score must be within [0, 1]".to_string()));
    }

    let user_match = state
        .services
        .matches
        .process_match(caller.0, request.matched_user_id, request.score, request.match_type)
        .await?;
    Ok(Json(user_match))
}

/// PUT /matches/:match_id/status
pub async fn update_match_status(
    State(state): State<AppState>,
    caller: CallerId,
    Path(match_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UserMatch>> {
    let user_match = state
        .services
        .matches
        .update_status_by_id(caller.0, match_id, request.status, request.notes)
        .await?;
    Ok(Json(user_match))
}

/// GET /matches/:match_id
pub async fn get_match(
    State(state): State<AppState>,
    caller: CallerId,
    Path(match_id): Path<Uuid>,
) -> ApiResult<Json<UserMatch>> {
    let user_match = state
        .services
        .matches
        .get_match(match_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("match {}", match_id)))?;
    caller.ensure_owner(user_match.user_id)?;
    Ok(Json(user_match))
}

/// GET /matches/users/:user_id
pub async fn list_matches(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<MatchListQuery>,
) -> ApiResult<Json<Page<UserMatch>>> {
    caller.ensure_owner(user_id)?;

    let manager = &state.services.matches;
    let mut matches = match query.status {
        Some(status) => manager.matches_by_status(user_id, status).await?,
        None => manager.matches_for_user(user_id).await?,
    };
    if let Some(match_type) = query.match_type {
        matches.retain(|m| m.match_type == match_type);
    }

    Ok(Json(Page::from_items(
        matches,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )))
}

/// GET /matches/users/:user_id/pending
pub async fn pending_matches(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Vec<UserMatch>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, DEFAULT_PAGE_SIZE)?;
    Ok(Json(state.services.matches.pending_matches(user_id, count).await?))
}

/// GET /matches/users/:user_id/high-score
pub async fn high_score_matches(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HighScoreQuery>,
) -> ApiResult<Json<Vec<UserMatch>>> {
    caller.ensure_owner(user_id)?;
    let count = resolve_count(query.count, DEFAULT_HIGH_SCORE_COUNT)?;
    let min_score = query.min_score.unwrap_or(DEFAULT_MIN_SCORE);

    let matches = state
        .services
        .matches
        .high_score_matches(user_id, min_score, count)
        .await?;
    Ok(Json(matches))
}

/// GET /matches/users/:user_id/stats
pub async fn match_stats(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MatchStats>> {
    caller.ensure_owner(user_id)?;
    Ok(Json(state.services.matches.match_stats(user_id).await?))
}

pub fn match_routes() -> Router<AppState> {
    Router::new()
        .route("/matches", post(process_match))
        .route("/matches/:match_id", get(get_match))
        .route("/matches/:match_id/status", put(update_match_status))
        .route("/matches/users/:user_id", get(list_matches))
        .route("/matches/users/:user_id/pending", get(pending_matches))
        .route("/matches/users/:user_id/high-score", get(high_score_matches))
        .route("/matches/users/:user_id/stats", get(match_stats))
}
