//! Enrichment pipeline
//!
//! Denormalizes sparse award records into fully joined read-model views:
//! student identity, best-available photo, current class enrollment, class
//! metadata, and the owning category. Works per batch, not per record:
//! ref unions are collected once, each collaborator is fetched once, and
//! the independent fetches run concurrently, so the number of store
//! round-trips is constant in the record count.

use crate::db::{categories, collaborators};
use crate::models::{
    AwardRecord, EnrichedAwardRecord, EnrichedClassEntry, EnrichedStudentEntry, SubAwardType,
};
use hoh_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

pub struct EnrichmentPipeline {
    db: SqlitePool,
}

impl EnrichmentPipeline {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Join a batch of records against the collaborator collections.
    /// Input is untouched; output is sorted by sub-award priority
    /// ascending with the incoming order as the stable tie-break.
    /// Any collaborator failure fails the whole batch; no partially
    /// merged records are returned.
    pub async fn enrich(&self, records: &[AwardRecord]) -> Result<Vec<EnrichedAwardRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // Ref unions (BTreeSet keeps fetch order deterministic)
        let mut student_union: BTreeSet<Uuid> = BTreeSet::new();
        let mut class_union: BTreeSet<Uuid> = BTreeSet::new();
        let mut category_union: BTreeSet<Uuid> = BTreeSet::new();
        // Photo and enrollment resolution is per (student, record) because
        // the school year varies by record, not globally
        let mut year_pairs: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();

        for record in records {
            category_union.insert(record.award_category);
            for entry in &record.students {
                student_union.insert(entry.student);
                if let Some(year) = record.sub_award.school_year {
                    year_pairs.insert((entry.student, year));
                }
            }
            for entry in &record.award_classes {
                class_union.insert(entry.class);
            }
        }

        let student_ids: Vec<Uuid> = student_union.into_iter().collect();
        let class_ids: Vec<Uuid> = class_union.into_iter().collect();
        let category_ids: Vec<Uuid> = category_union.into_iter().collect();
        let pairs: Vec<(Uuid, Uuid)> = year_pairs.into_iter().collect();

        tracing::debug!(
            records = records.len(),
            students = student_ids.len(),
            classes = class_ids.len(),
            pairs = pairs.len(),
            "Enriching award record batch"
        );

        // None of these depend on each other's results
        let (students, classes, category_list, primary_photos, fallback_photos, current_classes) =
            tokio::try_join!(
                collaborators::load_students(&self.db, &student_ids),
                collaborators::load_classes(&self.db, &class_ids),
                categories::load_categories_by_ids(&self.db, &category_ids),
                collaborators::load_primary_photos(&self.db, &pairs),
                collaborators::load_fallback_photos(&self.db, &student_ids),
                collaborators::load_current_classes(&self.db, &pairs),
            )?;

        let category_map: std::collections::HashMap<Uuid, _> = category_list
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut enriched: Vec<EnrichedAwardRecord> = records
            .iter()
            .map(|record| {
                let students = record
                    .students
                    .iter()
                    .map(|entry| {
                        // Schoolyear-scoped portrait first, latest photo as
                        // the fallback, none when the student has no photo
                        let photo = record
                            .sub_award
                            .school_year
                            .and_then(|year| primary_photos.get(&(entry.student, year)))
                            .or_else(|| fallback_photos.get(&entry.student))
                            .cloned();
                        let current_class = record
                            .sub_award
                            .school_year
                            .and_then(|year| current_classes.get(&(entry.student, year)))
                            .cloned();
                        EnrichedStudentEntry {
                            student: students.get(&entry.student).cloned(),
                            photo,
                            current_class,
                            note: entry.note.clone(),
                            note_eng: entry.note_eng.clone(),
                            activity: entry.activity.clone(),
                            activity_eng: entry.activity_eng.clone(),
                            score: entry.score.clone(),
                            exam: entry.exam.clone(),
                        }
                    })
                    .collect();

                let award_classes = record
                    .award_classes
                    .iter()
                    .map(|entry| EnrichedClassEntry {
                        class_info: classes.get(&entry.class).cloned(),
                        note: entry.note.clone(),
                        note_eng: entry.note_eng.clone(),
                    })
                    .collect();

                let mut sub_award = record.sub_award.clone();
                // Custom sub-awards default to priority 0 so the sort below
                // is total
                if sub_award.kind == SubAwardType::Custom && sub_award.priority.is_none() {
                    sub_award.priority = Some(0);
                }

                EnrichedAwardRecord {
                    id: record.id,
                    award_category: category_map.get(&record.award_category).cloned(),
                    sub_award,
                    students,
                    award_classes,
                    reason: record.reason.clone(),
                    meta: record.meta.clone(),
                    is_active: record.is_active,
                    version: record.version,
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                }
            })
            .collect();

        // Stable sort keeps the store-provided order within equal priorities
        enriched.sort_by_key(|r| r.sub_award.priority.unwrap_or(0));

        Ok(enriched)
    }
}
