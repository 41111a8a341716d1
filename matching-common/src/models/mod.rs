//! Domain models shared by the matching services
//!
//! Every weight, rating and score is clamped into its documented range when
//! a value is constructed or mutated, so persisted rows never leave it.

mod interaction;
mod location;
mod matching;
mod recommendation;
mod tag;

pub use interaction::{InteractionType, UserInteraction};
pub use location::Location;
pub use matching::{MatchStatus, MatchType, UserMatch};
pub use recommendation::RecommendationResult;
pub use tag::{Tag, TagCategory, UserTag};

/// Upper bound of an interaction rating
pub const MAX_RATING: f32 = 5.0;

/// Clamp a tag weight into [0, 1]
pub fn clamp_weight(value: f32) -> f32 {
    clamp_range(value, 0.0, 1.0)
}

/// Clamp a match or recommendation score into [0, 1]
pub fn clamp_score(value: f32) -> f32 {
    clamp_range(value, 0.0, 1.0)
}

/// Clamp an interaction rating into [0, 5]
pub fn clamp_rating(value: f32) -> f32 {
    clamp_range(value, 0.0, MAX_RATING)
}

fn clamp_range(value: f32, min: f32, max: f32) -> f32 {
    // NaN has no meaningful position in the range
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

/// Error returned when a stored or requested enum label is unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl From<UnknownVariant> for crate::Error {
    fn from(err: UnknownVariant) -> Self {
        crate::Error::validation(err.kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_hold_documented_ranges() {
        assert_eq!(clamp_weight(1.7), 1.0);
        assert_eq!(clamp_weight(-0.2), 0.0);
        assert_eq!(clamp_weight(0.35), 0.35);
        assert_eq!(clamp_rating(9.0), 5.0);
        assert_eq!(clamp_rating(-1.0), 0.0);
        assert_eq!(clamp_score(1.0001), 1.0);
    }

    #[test]
    fn test_clamp_maps_nan_to_lower_bound() {
        assert_eq!(clamp_weight(f32::NAN), 0.0);
        assert_eq!(clamp_rating(f32::NAN), 0.0);
    }
}
