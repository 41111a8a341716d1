//! Interaction endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use matching_common::models::{InteractionType, UserInteraction, MAX_RATING};
use serde::Deserialize;
use uuid::Uuid;

use super::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, DEFAULT_PAGE_SIZE};
use crate::services::InteractionStats;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordInteractionRequest {
    pub target_user_id: Uuid,
    #[serde(rename = "type", alias = "interaction_type")]
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionListQuery {
    #[serde(rename = "type")]
    pub interaction_type: Option<InteractionType>,
    pub target_user_id: Option<Uuid>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// POST /interactions
///
/// Recorded on behalf of the caller; the rating must lie in [0, 5].
pub async fn record_interaction(
    State(state): State<AppState>,
    caller: CallerId,
    Json(request): Json<RecordInteractionRequest>,
) -> ApiResult<(StatusCode, Json<UserInteraction>)> {
    if !(0.0..=MAX_RATING).contains(&request.rating) {
        return Err(ApiError::BadRequest(format!("rating must be within [0, {}]", MAX_RATING)));
    }

    let mut interaction =
        UserInteraction::new(caller.0, request.target_user_id, request.interaction_type, request.rating)
            .with_context(request.context);
    interaction.metadata = request.metadata;

    let recorded = state.services.interactions.record(interaction).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// GET /interactions/users/:user_id
pub async fn list_interactions(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
    Query(query): Query<InteractionListQuery>,
) -> ApiResult<Json<Page<UserInteraction>>> {
    caller.ensure_owner(user_id)?;

    let ledger = &state.services.interactions;
    let mut interactions = match query.interaction_type {
        Some(interaction_type) => ledger.interactions_by_type(user_id, interaction_type).await?,
        None => ledger.interactions_for_user(user_id).await?,
    };
    if let Some(target) = query.target_user_id {
        interactions.retain(|i| i.target_user_id == target);
    }

    Ok(Json(Page::from_items(
        interactions,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )))
}

/// GET /interactions/users/:user_id/stats
pub async fn interaction_stats(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<InteractionStats>> {
    caller.ensure_owner(user_id)?;
    Ok(Json(state.services.interactions.interaction_stats(user_id).await?))
}

pub fn interaction_routes() -> Router<AppState> {
    Router::new()
        .route("/interactions", post(record_interaction))
        .route("/interactions/users/:user_id", get(list_interactions))
        .route("/interactions/users/:user_id/stats", get(interaction_stats))
}
