//! Tag catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use matching_common::models::{Tag, TagCategory, UserTag};
use serde::Deserialize;
use uuid::Uuid;

use super::{resolve_count, CallerId};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_POPULAR_COUNT: usize = 20;
const DEFAULT_SEARCH_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: TagCategory,
}

#[derive(Debug, Deserialize)]
pub struct TagListQuery {
    pub category: Option<TagCategory>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keyword: String,
    pub count: Option<usize>,
}

/// GET /tags
pub async fn list_tags(
    State(state): State<AppState>,
    _caller: CallerId,
    Query(query): Query<TagListQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    let tags = match query.category {
        Some(category) => state.services.tags.tags_by_category(category).await?,
        None => state.services.tags.list_tags().await?,
    };
    Ok(Json(tags))
}

/// GET /tags/popular
pub async fn popular_tags(
    State(state): State<AppState>,
    _caller: CallerId,
    Query(query): Query<PopularQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    let count = resolve_count(query.count, DEFAULT_POPULAR_COUNT)?;
    Ok(Json(state.services.tags.popular_tags(count).await?))
}

/// GET /tags/search
pub async fn search_tags(
    State(state): State<AppState>,
    _caller: CallerId,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    let keyword = query.keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::BadRequest("keyword must not be empty".to_string()));
    }
    let count = resolve_count(query.count, DEFAULT_SEARCH_COUNT)?;
    Ok(Json(state.services.tags.search_tags(keyword, count).await?))
}

/// POST /tags
pub async fn create_tag(
    State(state): State<AppState>,
    _caller: CallerId,
    Json(request): Json<TagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = state
        .services
        .tags
        .create_tag(&request.name, &request.description, request.category)
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /tags/:id
pub async fn get_tag(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Tag>> {
    state
        .services
        .tags
        .get_tag(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("tag {}", id)))
}

/// PUT /tags/:id
pub async fn update_tag(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<Uuid>,
    Json(request): Json<TagRequest>,
) -> ApiResult<Json<Tag>> {
    let tag = state
        .services
        .tags
        .update_tag(id, &request.name, &request.description, request.category)
        .await?;
    Ok(Json(tag))
}

/// DELETE /tags/:id
pub async fn delete_tag(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.services.tags.delete_tag(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("tag {}", id)))
    }
}

/// GET /tags/:id/users
pub async fn tag_holders(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserTag>>> {
    Ok(Json(state.services.tags.tag_holders(id).await?))
}

pub fn tag_routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/popular", get(popular_tags))
        .route("/tags/search", get(search_tags))
        .route("/tags/:id", get(get_tag).put(update_tag).delete(delete_tag))
        .route("/tags/:id/users", get(tag_holders))
}
