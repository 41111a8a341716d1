//! Tags and user/tag affinity relations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{clamp_weight, UnknownVariant};
use crate::time;

/// Tag category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagCategory {
    Sports,
    Gaming,
    Learning,
    Food,
    Travel,
    Music,
    Technology,
    Fashion,
    Reading,
    Other,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::Sports => "sports",
            TagCategory::Gaming => "gaming",
            TagCategory::Learning => "learning",
            TagCategory::Food => "food",
            TagCategory::Travel => "travel",
            TagCategory::Music => "music",
            TagCategory::Technology => "technology",
            TagCategory::Fashion => "fashion",
            TagCategory::Reading => "reading",
            TagCategory::Other => "other",
        }
    }
}

impl FromStr for TagCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "sports" => TagCategory::Sports,
            "gaming" => TagCategory::Gaming,
            "learning" => TagCategory::Learning,
            "food" => TagCategory::Food,
            "travel" => TagCategory::Travel,
            "music" => TagCategory::Music,
            "technology" => TagCategory::Technology,
            "fashion" => TagCategory::Fashion,
            "reading" => TagCategory::Reading,
            "other" => TagCategory::Other,
            _ => {
                return Err(UnknownVariant {
                    kind: "category",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// Labeled interest category users attach to themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: TagCategory,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Tag {
    /// Create a new, unused, active tag
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: TagCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            category,
            usage_count: 0,
            created_at: time::now(),
            last_used_at: None,
            is_active: true,
        }
    }

    /// Record one more user holding this tag
    pub fn increment_usage(&mut self) {
        self.usage_count += 1;
        self.last_used_at = Some(time::now());
    }

    /// Record one user dropping this tag (floors at 0)
    pub fn decrement_usage(&mut self) {
        if self.usage_count > 0 {
            self.usage_count -= 1;
        }
    }

    pub fn update_info(&mut self, name: impl Into<String>, description: impl Into<String>, category: TagCategory) {
        self.name = name.into();
        self.description = description.into();
        self.category = category;
    }
}

/// Strength of one user's interest in one tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tag_id: Uuid,
    /// Interest strength in [0, 1]
    pub weight: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl UserTag {
    pub fn new(user_id: Uuid, tag_id: Uuid, weight: f32) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            tag_id,
            weight: clamp_weight(weight),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }

    pub fn update_weight(&mut self, weight: f32) {
        self.weight = clamp_weight(weight);
        self.updated_at = time::now();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = time::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = time::now();
    }
}
