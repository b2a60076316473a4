//! Award category and sub-award template models
//!
//! Categories own their sub-award templates exclusively: templates are
//! embedded value objects serialized into the category row, never
//! referenced independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time scoping of a sub-award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAwardType {
    Month,
    Semester,
    Year,
    Custom,
    CustomWithDescription,
}

impl SubAwardType {
    /// Wire/storage name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAwardType::Month => "month",
            SubAwardType::Semester => "semester",
            SubAwardType::Year => "year",
            SubAwardType::Custom => "custom",
            SubAwardType::CustomWithDescription => "custom_with_description",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "month" => Some(SubAwardType::Month),
            "semester" => Some(SubAwardType::Semester),
            "year" => Some(SubAwardType::Year),
            "custom" => Some(SubAwardType::Custom),
            "custom_with_description" => Some(SubAwardType::CustomWithDescription),
            _ => None,
        }
    }

    /// Custom-labeled types carry denormalized priority/label_eng snapshots
    /// and are the only types removable via sub-award deletion.
    pub fn is_custom(&self) -> bool {
        matches!(self, SubAwardType::Custom | SubAwardType::CustomWithDescription)
    }
}

impl std::fmt::Display for SubAwardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-award template embedded in a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAwardTemplate {
    #[serde(rename = "type")]
    pub kind: SubAwardType,
    pub school_year: Option<Uuid>,
    pub month: Option<i64>,
    pub semester: Option<i64>,
    pub year: Option<i64>,
    pub label: String,
    pub label_eng: Option<String>,
    pub description: Option<String>,
    pub description_eng: Option<String>,
    #[serde(default)]
    pub award_count: i64,
    pub priority: Option<i64>,
}

/// Top-level grouping of honors (e.g. "Academic Excellence")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardCategory {
    pub id: Uuid,
    pub name: String,
    pub name_eng: String,
    pub description: Option<String>,
    pub description_eng: Option<String>,
    pub cover_image: Option<String>,
    pub sub_awards: Vec<SubAwardTemplate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AwardCategory {
    /// Find the template a custom sub-award instance inherits from,
    /// matched by type and label.
    pub fn find_template(&self, kind: SubAwardType, label: &str) -> Option<&SubAwardTemplate> {
        self.sub_awards
            .iter()
            .find(|t| t.kind == kind && t.label == label)
    }
}

/// Payload for creating or replacing a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAwardCategory {
    pub name: String,
    pub name_eng: String,
    pub description: Option<String>,
    pub description_eng: Option<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub sub_awards: Vec<SubAwardTemplate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
