//! Duplicate Guard
//!
//! The invariant engine in front of the award record store. No student or
//! class may be awarded the same category/sub-award combination twice:
//! within one record entries are deduplicated (first occurrence wins), and
//! across records any overlap under the same sub-award key is rejected,
//! never merged. Batches are validated with one disjunctive query before
//! anything is committed; a single conflict fails the whole batch.

use crate::db::records::{find_matching_records, SubAwardKey};
use crate::models::AwardRecord;
use hoh_common::{ConflictKind, Error, Result};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use uuid::Uuid;

pub struct DuplicateGuard;

impl DuplicateGuard {
    /// Enforce intra-record uniqueness: drop repeated student/class refs,
    /// keeping the first occurrence of each
    pub fn dedupe_entries(record: &mut AwardRecord) {
        let mut seen_students = HashSet::new();
        record.students.retain(|entry| seen_students.insert(entry.student));

        let mut seen_classes = HashSet::new();
        record.award_classes.retain(|entry| seen_classes.insert(entry.class));
    }

    /// Validate candidates against each other and against the store.
    /// `exclude` skips the record being updated. Runs on the caller's
    /// connection so batch creation can validate inside its transaction.
    pub async fn validate(
        conn: &mut SqliteConnection,
        candidates: &[AwardRecord],
        exclude: Option<Uuid>,
    ) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }

        let keys: Vec<SubAwardKey> = candidates.iter().map(SubAwardKey::of).collect();

        // Candidates in one batch can conflict with each other before the
        // store sees any of them
        for (i, candidate) in candidates.iter().enumerate() {
            for other in candidates.iter().skip(i + 1) {
                if keys[i].matches(other) {
                    check_overlap(candidate, other)?;
                }
            }
        }

        let existing = find_matching_records(conn, &keys, exclude).await?;
        if existing.is_empty() {
            return Ok(());
        }

        for (candidate, key) in candidates.iter().zip(&keys) {
            for record in existing.iter().filter(|r| key.matches(r)) {
                check_overlap(candidate, record)?;
            }
        }

        Ok(())
    }
}

/// Reject any shared student ref, then any shared class ref. The class
/// check runs independently of the student check, so a record with no
/// student overlap still fails when a class is re-awarded.
fn check_overlap(candidate: &AwardRecord, other: &AwardRecord) -> Result<()> {
    let other_students: HashSet<Uuid> = other.students.iter().map(|e| e.student).collect();
    if let Some(entry) = candidate
        .students
        .iter()
        .find(|e| other_students.contains(&e.student))
    {
        tracing::debug!(
            student = %entry.student,
            label = %candidate.sub_award.label,
            conflicting_record = %other.id,
            "Duplicate student award rejected"
        );
        return Err(Error::Duplicate {
            kind: ConflictKind::Student,
            label: candidate.sub_award.label.clone(),
            school_year: candidate.sub_award.school_year,
        });
    }

    let other_classes: HashSet<Uuid> = other.award_classes.iter().map(|e| e.class).collect();
    if let Some(entry) = candidate
        .award_classes
        .iter()
        .find(|e| other_classes.contains(&e.class))
    {
        tracing::debug!(
            class = %entry.class,
            label = %candidate.sub_award.label,
            conflicting_record = %other.id,
            "Duplicate class award rejected"
        );
        return Err(Error::Duplicate {
            kind: ConflictKind::Class,
            label: candidate.sub_award.label.clone(),
            school_year: candidate.sub_award.school_year,
        });
    }

    Ok(())
}
