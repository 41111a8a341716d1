//! Proposed matches and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{clamp_score, UnknownVariant};
use crate::{time, Error, Result};

/// Strategy that produced a match or recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    TagBased,
    CollaborativeFiltering,
    LocationBased,
    ActivityBased,
    Hybrid,
    Random,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::TagBased => "tag-based",
            MatchType::CollaborativeFiltering => "collaborative-filtering",
            MatchType::LocationBased => "location-based",
            MatchType::ActivityBased => "activity-based",
            MatchType::Hybrid => "hybrid",
            MatchType::Random => "random",
        }
    }
}

impl FromStr for MatchType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "tag-based" => MatchType::TagBased,
            "collaborative-filtering" => MatchType::CollaborativeFiltering,
            "location-based" => MatchType::LocationBased,
            "activity-based" => MatchType::ActivityBased,
            "hybrid" => MatchType::Hybrid,
            "random" => MatchType::Random,
            _ => {
                return Err(UnknownVariant {
                    kind: "match_type",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// Match lifecycle state
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Expired => "expired",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

impl FromStr for MatchStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "pending" => MatchStatus::Pending,
            "accepted" => MatchStatus::Accepted,
            "rejected" => MatchStatus::Rejected,
            "expired" => MatchStatus::Expired,
            "cancelled" => MatchStatus::Cancelled,
            _ => {
                return Err(UnknownVariant {
                    kind: "status",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// Proposed pairing, unique per ordered (user, matched user) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMatch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub matched_user_id: Uuid,
    /// Match score in [0, 1]
    pub score: f32,
    pub match_type: MatchType,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl UserMatch {
    pub fn new(user_id: Uuid, matched_user_id: Uuid, score: f32, match_type: MatchType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            matched_user_id,
            score: clamp_score(score),
            match_type,
            status: MatchStatus::Pending,
            created_at: time::now(),
            last_interaction_at: None,
            notes: None,
        }
    }

    pub fn update_score(&mut self, score: f32) {
        self.score = clamp_score(score);
    }

    /// Move to `next`, returning whether anything changed
    ///
    /// Re-applying the current status is a no-op. Terminal states accept no
    /// further transitions and nothing may return to `Pending`.
    pub fn transition(&mut self, next: MatchStatus) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        if self.status.is_terminal() || next == MatchStatus::Pending {
            return Err(Error::Conflict(format!(
                "match {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        if matches!(next, MatchStatus::Accepted | MatchStatus::Rejected) {
            self.last_interaction_at = Some(time::now());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> UserMatch {
        UserMatch::new(Uuid::new_v4(), Uuid::new_v4(), 0.6, MatchType::Hybrid)
    }

    #[test]
    fn test_new_match_is_pending_with_clamped_score() {
        let m = UserMatch::new(Uuid::new_v4(), Uuid::new_v4(), 1.4, MatchType::TagBased);
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_accept_stamps_last_interaction() {
        let mut m = pending();
        assert!(m.transition(MatchStatus::Accepted).unwrap());
        assert_eq!(m.status, MatchStatus::Accepted);
        assert!(m.last_interaction_at.is_some());
    }

    #[test]
    fn test_expire_does_not_stamp_last_interaction() {
        let mut m = pending();
        m.transition(MatchStatus::Expired).unwrap();
        assert!(m.last_interaction_at.is_none());
    }

    #[test]
    fn test_repeating_status_is_noop() {
        let mut m = pending();
        m.transition(MatchStatus::Rejected).unwrap();
        assert!(!m.transition(MatchStatus::Rejected).unwrap());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut m = pending();
        m.transition(MatchStatus::Cancelled).unwrap();
        assert!(matches!(m.transition(MatchStatus::Accepted), Err(Error::Conflict(_))));

        let mut m = pending();
        m.transition(MatchStatus::Accepted).unwrap();
        assert!(matches!(m.transition(MatchStatus::Pending), Err(Error::Conflict(_))));
    }
}
