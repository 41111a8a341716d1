//! Transient recommendation values

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{clamp_score, MatchType};

/// One ranked, explainable candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub user_id: Uuid,
    /// Score in [0, 1]
    pub score: f32,
    pub match_type: MatchType,
    pub reason: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl RecommendationResult {
    pub fn new(user_id: Uuid, score: f32, match_type: MatchType, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            score: clamp_score(score),
            match_type,
            reason: reason.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_clamped() {
        let rec = RecommendationResult::new(Uuid::new_v4(), 2.4, MatchType::TagBased, "tag similarity");
        assert_eq!(rec.score, 1.0);
    }

    #[test]
    fn test_metadata_builder() {
        let rec = RecommendationResult::new(Uuid::new_v4(), 0.5, MatchType::Random, "random exploration")
            .with_metadata("random", true);
        assert_eq!(rec.metadata["random"], Value::Bool(true));
    }
}
