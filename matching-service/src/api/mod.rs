//! HTTP API handlers for the matching service

pub mod caller;
pub mod health;
pub mod interactions;
pub mod matches;
pub mod recommendations;
pub mod tags;
pub mod user_tags;

pub use caller::CallerId;
pub use health::health_routes;
pub use interactions::interaction_routes;
pub use matches::match_routes;
pub use recommendations::recommendation_routes;
pub use tags::tag_routes;
pub use user_tags::user_tag_routes;

use crate::error::{ApiError, ApiResult};

/// Upper bound for any `count` query parameter
pub const MAX_COUNT: usize = 100;

/// Apply the default for a missing `count`; 400 outside 1..=MAX_COUNT
pub(crate) fn resolve_count(requested: Option<usize>, default: usize) -> ApiResult<usize> {
    let count = requested.unwrap_or(default);
    if (1..=MAX_COUNT).contains(&count) {
        Ok(count)
    } else {
        Err(ApiError::BadRequest(format!("count must be within [1, {}]", MAX_COUNT)))
    }
}
