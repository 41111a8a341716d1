//! Pairwise user interactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{clamp_rating, UnknownVariant};
use crate::time;

/// Kind of action one user took toward another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionType {
    ViewProfile,
    SendMessage,
    Like,
    Follow,
    Comment,
    Share,
    Report,
    JoinGroup,
    JoinActivity,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::ViewProfile => "view-profile",
            InteractionType::SendMessage => "send-message",
            InteractionType::Like => "like",
            InteractionType::Follow => "follow",
            InteractionType::Comment => "comment",
            InteractionType::Share => "share",
            InteractionType::Report => "report",
            InteractionType::JoinGroup => "join-group",
            InteractionType::JoinActivity => "join-activity",
        }
    }
}

impl FromStr for InteractionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "view-profile" => InteractionType::ViewProfile,
            "send-message" => InteractionType::SendMessage,
            "like" => InteractionType::Like,
            "follow" => InteractionType::Follow,
            "comment" => InteractionType::Comment,
            "share" => InteractionType::Share,
            "report" => InteractionType::Report,
            "join-group" => InteractionType::JoinGroup,
            "join-activity" => InteractionType::JoinActivity,
            _ => {
                return Err(UnknownVariant {
                    kind: "type",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// One append-only ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_user_id: Uuid,
    pub interaction_type: InteractionType,
    /// Explicit or derived rating in [0, 5]; 0 means "unrated"
    pub rating: f32,
    pub created_at: DateTime<Utc>,
    pub context: Option<String>,
    pub metadata: Option<String>,
}

impl UserInteraction {
    pub fn new(user_id: Uuid, target_user_id: Uuid, interaction_type: InteractionType, rating: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            target_user_id,
            interaction_type,
            rating: clamp_rating(rating),
            created_at: time::now(),
            context: None,
            metadata: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.is_empty());
        self
    }

    pub fn update_rating(&mut self, rating: f32) {
        self.rating = clamp_rating(rating);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_clamped_on_construction_and_correction() {
        let mut interaction =
            UserInteraction::new(Uuid::new_v4(), Uuid::new_v4(), InteractionType::Like, 7.5);
        assert_eq!(interaction.rating, 5.0);

        interaction.update_rating(-2.0);
        assert_eq!(interaction.rating, 0.0);
    }

    #[test]
    fn test_empty_context_is_dropped() {
        let interaction = UserInteraction::new(Uuid::new_v4(), Uuid::new_v4(), InteractionType::Comment, 0.0)
            .with_context(Some(String::new()));
        assert!(interaction.context.is_none());
    }

    #[test]
    fn test_type_serializes_as_kebab_label() {
        let json = serde_json::to_string(&InteractionType::JoinActivity).unwrap();
        assert_eq!(json, "\"join-activity\"");
        assert_eq!("view-profile".parse::<InteractionType>().unwrap(), InteractionType::ViewProfile);
    }
}
