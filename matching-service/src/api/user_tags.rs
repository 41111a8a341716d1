//! Per-user tag endpoints
//!
//! Users manage only their own tags.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use matching_common::models::UserTag;
use serde::Deserialize;
use uuid::Uuid;

use super::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::services::tag_catalog::DEFAULT_TAG_WEIGHT;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AttachTagRequest {
    pub tag_id: Uuid,
    #[serde(default)]
    pub weight: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWeightRequest {
    pub weight: f32,
}

fn check_weight(weight: f32) -> ApiResult<f32> {
    if (0.0..=1.0).contains(&weight) {
        Ok(weight)
    } else {
        Err(ApiError::BadRequest("weight must be within [0, 1]".to_string()))
    }
}

/// GET /users/:user_id/tags
pub async fn list_user_tags(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserTag>>> {
    caller.ensure_owner(user_id)?;
    Ok(Json(state.services.tags.user_tags(user_id).await?))
}

/// POST /users/:user_id/tags
pub async fn attach_user_tag(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AttachTagRequest>,
) -> ApiResult<(StatusCode, Json<UserTag>)> {
    caller.ensure_owner(user_id)?;
    let weight = check_weight(request.weight.unwrap_or(DEFAULT_TAG_WEIGHT))?;

    let user_tag = state.services.tags.attach_tag(user_id, request.tag_id, weight).await?;
    Ok((StatusCode::CREATED, Json(user_tag)))
}

/// GET /users/:user_id/tags/:tag_id
pub async fn get_user_tag(
    State(state): State<AppState>,
    caller: CallerId,
    Path((user_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<UserTag>> {
    caller.ensure_owner(user_id)?;
    state
        .services
        .tags
        .user_tag(user_id, tag_id)
        .await?
        .filter(|t| t.is_active)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("tag {} for user {}", tag_id, user_id)))
}

/// PUT /users/:user_id/tags/:tag_id
pub async fn update_user_tag(
    State(state): State<AppState>,
    caller: CallerId,
    Path((user_id, tag_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateWeightRequest>,
) -> ApiResult<Json<UserTag>> {
    caller.ensure_owner(user_id)?;
    let weight = check_weight(request.weight)?;
    Ok(Json(
        state.services.tags.update_user_tag_weight(user_id, tag_id, weight).await?,
    ))
}

/// DELETE /users/:user_id/tags/:tag_id
///
/// Idempotent: removing a tag the user does not hold still returns 204.
pub async fn detach_user_tag(
    State(state): State<AppState>,
    caller: CallerId,
    Path((user_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    caller.ensure_owner(user_id)?;
    state.services.tags.detach_tag(user_id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn user_tag_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/tags", get(list_user_tags).post(attach_user_tag))
        .route(
            "/users/:user_id/tags/:tag_id",
            get(get_user_tag).put(update_user_tag).delete(detach_user_tag),
        )
}
