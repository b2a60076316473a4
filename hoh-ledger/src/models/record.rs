//! Award record models
//!
//! An award record is the persisted grant of one sub-award instance to a
//! set of students and/or classes. The sub-award instance is a copy of the
//! template's identifying fields; for custom types, `priority` and
//! `label_eng` are snapshotted from the category template at creation or
//! update time and are not re-resolved on read.

use super::category::SubAwardType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Concrete sub-award carried by a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAwardInstance {
    #[serde(rename = "type")]
    pub kind: SubAwardType,
    pub school_year: Option<Uuid>,
    pub month: Option<i64>,
    pub semester: Option<i64>,
    pub year: Option<i64>,
    pub label: String,
    pub label_eng: Option<String>,
    pub description: Option<String>,
    /// Snapshot of the template priority for custom types; None until
    /// normalized (custom defaults to 0 during enrichment)
    pub priority: Option<i64>,
}

/// One student's entry within a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAwardEntry {
    pub student: Uuid,
    pub note: Option<String>,
    pub note_eng: Option<String>,
    #[serde(default)]
    pub activity: Vec<String>,
    #[serde(default)]
    pub activity_eng: Vec<String>,
    pub score: Option<String>,
    pub exam: Option<String>,
}

impl StudentAwardEntry {
    pub fn new(student: Uuid) -> Self {
        Self {
            student,
            note: None,
            note_eng: None,
            activity: Vec::new(),
            activity_eng: Vec::new(),
            score: None,
            exam: None,
        }
    }
}

/// One class's entry within a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAwardEntry {
    pub class: Uuid,
    pub note: Option<String>,
    pub note_eng: Option<String>,
}

impl ClassAwardEntry {
    pub fn new(class: Uuid) -> Self {
        Self {
            class,
            note: None,
            note_eng: None,
        }
    }
}

/// Persisted award record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardRecord {
    pub id: Uuid,
    pub award_category: Uuid,
    pub sub_award: SubAwardInstance,
    pub students: Vec<StudentAwardEntry>,
    pub award_classes: Vec<ClassAwardEntry>,
    pub reason: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a record (also the update payload: updates replace
/// the mutable fields wholesale and bump the version)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAwardRecord {
    pub award_category: Uuid,
    pub sub_award: SubAwardInstance,
    #[serde(default)]
    pub students: Vec<StudentAwardEntry>,
    #[serde(default)]
    pub award_classes: Vec<ClassAwardEntry>,
    pub reason: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl NewAwardRecord {
    /// Materialize a payload into a record with a fresh id and version 1
    pub fn into_record(self, now: DateTime<Utc>) -> AwardRecord {
        AwardRecord {
            id: Uuid::new_v4(),
            award_category: self.award_category,
            sub_award: self.sub_award,
            students: self.students,
            award_classes: self.award_classes,
            reason: self.reason,
            meta: self.meta,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
