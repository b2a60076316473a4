//! Enriched read-model types
//!
//! Derived, request-scoped views: an award record joined against the
//! student, class, enrollment, and photo collaborators. Never persisted;
//! this is the unit cached by the cache layer.

use super::category::AwardCategory;
use super::record::SubAwardInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Student identity projection (collaborator shape, queried by id set)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProjection {
    pub id: Uuid,
    pub name: String,
    pub student_code: String,
}

/// Class projection (collaborator shape, queried by id set)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassProjection {
    pub id: Uuid,
    pub class_name: String,
    pub grade: Option<String>,
    pub class_image: Option<String>,
}

/// Photo projection; `school_year` tags the academic year the portrait
/// belongs to, `created_at` orders candidates newest-first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoProjection {
    pub id: Uuid,
    pub student: Option<Uuid>,
    pub school_year: Option<Uuid>,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
}

/// Student entry with resolved identity, best-available photo, and current
/// class enrollment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedStudentEntry {
    pub student: Option<StudentProjection>,
    pub photo: Option<PhotoProjection>,
    pub current_class: Option<ClassProjection>,
    pub note: Option<String>,
    pub note_eng: Option<String>,
    pub activity: Vec<String>,
    pub activity_eng: Vec<String>,
    pub score: Option<String>,
    pub exam: Option<String>,
}

/// Class entry with resolved class metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedClassEntry {
    pub class_info: Option<ClassProjection>,
    pub note: Option<String>,
    pub note_eng: Option<String>,
}

/// Fully joined award record view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAwardRecord {
    pub id: Uuid,
    pub award_category: Option<AwardCategory>,
    pub sub_award: SubAwardInstance,
    pub students: Vec<EnrichedStudentEntry>,
    pub award_classes: Vec<EnrichedClassEntry>,
    pub reason: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
