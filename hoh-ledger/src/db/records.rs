//! Award record store
//!
//! The sub-award key dimensions (category, type, label, school year,
//! semester, month, priority) are denormalized into real columns so that
//! duplicate probes, query filters, page ordering, and statistics all run
//! in SQL. The full sub-award payload and the embedded student/class entry
//! collections travel as JSON TEXT columns.

use crate::models::{AwardRecord, ClassAwardEntry, StudentAwardEntry, SubAwardInstance, SubAwardType};
use chrono::{DateTime, Utc};
use hoh_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "guid, award_category, sub_award, students, award_classes, reason, \
     meta, is_active, version, created_at, updated_at";

/// Base duplicate-match key of a record: `(category, type, label,
/// school_year)`, extended with semester/month only when the candidate
/// carries them. Omitting an inapplicable dimension from the key (rather
/// than matching it as null) keeps the probe from over- or under-matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAwardKey {
    pub award_category: Uuid,
    pub kind: SubAwardType,
    pub label: String,
    pub school_year: Option<Uuid>,
    pub semester: Option<i64>,
    pub month: Option<i64>,
}

impl SubAwardKey {
    pub fn of(record: &AwardRecord) -> Self {
        Self {
            award_category: record.award_category,
            kind: record.sub_award.kind,
            label: record.sub_award.label.clone(),
            school_year: record.sub_award.school_year,
            semester: record.sub_award.semester,
            month: record.sub_award.month,
        }
    }

    /// Whether another record falls under this key
    pub fn matches(&self, other: &AwardRecord) -> bool {
        other.award_category == self.award_category
            && other.sub_award.kind == self.kind
            && other.sub_award.label == self.label
            && other.sub_award.school_year == self.school_year
            && self.semester.map_or(true, |s| other.sub_award.semester == Some(s))
            && self.month.map_or(true, |m| other.sub_award.month == Some(m))
    }
}

/// Optional, independently combinable record filters; an absent filter
/// imposes no constraint
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RecordFilters {
    pub category: Option<Uuid>,
    pub sub_award_type: Option<SubAwardType>,
    pub sub_award_label: Option<String>,
    pub school_year: Option<Uuid>,
    pub semester: Option<i64>,
    pub month: Option<i64>,
    pub student: Option<Uuid>,
    pub class: Option<Uuid>,
}

/// Per-type aggregate over matching records
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubAwardTypeStats {
    pub sub_award_type: SubAwardType,
    pub total_records: i64,
    pub total_students: i64,
    pub total_classes: i64,
}

fn record_from_row(row: &SqliteRow) -> Result<AwardRecord> {
    let guid: String = row.try_get("guid")?;
    let category: String = row.try_get("award_category")?;
    let sub_award_json: String = row.try_get("sub_award")?;
    let students_json: String = row.try_get("students")?;
    let classes_json: String = row.try_get("award_classes")?;
    let meta_json: Option<String> = row.try_get("meta")?;

    let sub_award: SubAwardInstance = serde_json::from_str(&sub_award_json)
        .map_err(|e| Error::Internal(format!("Invalid sub_award JSON in database: {}", e)))?;
    let students: Vec<StudentAwardEntry> = serde_json::from_str(&students_json)
        .map_err(|e| Error::Internal(format!("Invalid students JSON in database: {}", e)))?;
    let award_classes: Vec<ClassAwardEntry> = serde_json::from_str(&classes_json)
        .map_err(|e| Error::Internal(format!("Invalid award_classes JSON in database: {}", e)))?;
    let meta = meta_json
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| Error::Internal(format!("Invalid meta JSON in database: {}", e)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(AwardRecord {
        id: parse_uuid(&guid)?,
        award_category: parse_uuid(&category)?,
        sub_award,
        students,
        award_classes,
        reason: row.try_get("reason")?,
        meta,
        is_active: row.try_get("is_active")?,
        version: row.try_get("version")?,
        created_at,
        updated_at,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn encode_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

/// Insert a record inside the caller's transaction (or any connection).
/// The duplicate guard must have approved the record first; nothing below
/// this layer re-checks the award invariants.
pub async fn insert_record(conn: &mut SqliteConnection, record: &AwardRecord) -> Result<()> {
    let meta_json = record
        .meta
        .as_ref()
        .map(|m| encode_json(m, "meta"))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO award_records (
            guid, award_category,
            sub_award_type, sub_award_label, sub_award_school_year,
            sub_award_semester, sub_award_month, sub_award_priority,
            sub_award, students, award_classes, reason, meta,
            is_active, version, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.award_category.to_string())
    .bind(record.sub_award.kind.as_str())
    .bind(&record.sub_award.label)
    .bind(record.sub_award.school_year.map(|y| y.to_string()))
    .bind(record.sub_award.semester)
    .bind(record.sub_award.month)
    .bind(record.sub_award.priority)
    .bind(encode_json(&record.sub_award, "sub_award")?)
    .bind(encode_json(&record.students, "students")?)
    .bind(encode_json(&record.award_classes, "award_classes")?)
    .bind(&record.reason)
    .bind(meta_json)
    .bind(record.is_active)
    .bind(record.version)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Replace a record's mutable fields; returns false when missing
pub async fn update_record_row(conn: &mut SqliteConnection, record: &AwardRecord) -> Result<bool> {
    let meta_json = record
        .meta
        .as_ref()
        .map(|m| encode_json(m, "meta"))
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE award_records SET
            award_category = ?,
            sub_award_type = ?, sub_award_label = ?, sub_award_school_year = ?,
            sub_award_semester = ?, sub_award_month = ?, sub_award_priority = ?,
            sub_award = ?, students = ?, award_classes = ?, reason = ?, meta = ?,
            is_active = ?, version = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(record.award_category.to_string())
    .bind(record.sub_award.kind.as_str())
    .bind(&record.sub_award.label)
    .bind(record.sub_award.school_year.map(|y| y.to_string()))
    .bind(record.sub_award.semester)
    .bind(record.sub_award.month)
    .bind(record.sub_award.priority)
    .bind(encode_json(&record.sub_award, "sub_award")?)
    .bind(encode_json(&record.students, "students")?)
    .bind(encode_json(&record.award_classes, "award_classes")?)
    .bind(&record.reason)
    .bind(meta_json)
    .bind(record.is_active)
    .bind(record.version)
    .bind(record.updated_at)
    .bind(record.id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load one record by id
pub async fn get_record(pool: &SqlitePool, id: Uuid) -> Result<Option<AwardRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM award_records WHERE guid = ?",
        RECORD_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Delete one record; returns false when missing
pub async fn delete_record(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM award_records WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch every record falling under any of the given sub-award keys, as a
/// single disjunctive query (one round-trip for a whole batch of
/// candidates). `exclude` skips the record being updated.
///
/// `label` and `school_year` compare with IS so a null dimension matches
/// null rather than nothing; semester/month only constrain the group when
/// the key carries them.
pub async fn find_matching_records(
    conn: &mut SqliteConnection,
    keys: &[SubAwardKey],
    exclude: Option<Uuid>,
) -> Result<Vec<AwardRecord>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM award_records WHERE (",
        RECORD_COLUMNS
    ));

    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(award_category = ");
        qb.push_bind(key.award_category.to_string());
        qb.push(" AND sub_award_type = ");
        qb.push_bind(key.kind.as_str());
        qb.push(" AND sub_award_label IS ");
        qb.push_bind(key.label.clone());
        qb.push(" AND sub_award_school_year IS ");
        qb.push_bind(key.school_year.map(|y| y.to_string()));
        if let Some(semester) = key.semester {
            qb.push(" AND sub_award_semester = ");
            qb.push_bind(semester);
        }
        if let Some(month) = key.month {
            qb.push(" AND sub_award_month = ");
            qb.push_bind(month);
        }
        qb.push(")");
    }
    qb.push(")");

    if let Some(exclude) = exclude {
        qb.push(" AND guid != ");
        qb.push_bind(exclude.to_string());
    }

    let rows = qb.build().fetch_all(conn).await?;
    rows.iter().map(record_from_row).collect()
}

fn push_filter_predicates(qb: &mut QueryBuilder<'_, Sqlite>, filters: &RecordFilters) {
    if let Some(category) = filters.category {
        qb.push(" AND award_category = ");
        qb.push_bind(category.to_string());
    }
    if let Some(kind) = filters.sub_award_type {
        qb.push(" AND sub_award_type = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(label) = &filters.sub_award_label {
        qb.push(" AND sub_award_label = ");
        qb.push_bind(label.clone());
    }
    if let Some(school_year) = filters.school_year {
        qb.push(" AND sub_award_school_year = ");
        qb.push_bind(school_year.to_string());
    }
    if let Some(semester) = filters.semester {
        qb.push(" AND sub_award_semester = ");
        qb.push_bind(semester);
    }
    if let Some(month) = filters.month {
        qb.push(" AND sub_award_month = ");
        qb.push_bind(month);
    }
    if let Some(student) = filters.student {
        qb.push(
            " AND EXISTS (SELECT 1 FROM json_each(award_records.students) \
             WHERE json_extract(json_each.value, '$.student') = ",
        );
        qb.push_bind(student.to_string());
        qb.push(")");
    }
    if let Some(class) = filters.class {
        qb.push(
            " AND EXISTS (SELECT 1 FROM json_each(award_records.award_classes) \
             WHERE json_extract(json_each.value, '$.class') = ",
        );
        qb.push_bind(class.to_string());
        qb.push(")");
    }
}

/// Count records matching the filters (same predicate as the page query,
/// executed independently, so the total is best-effort under concurrent
/// writes)
pub async fn count_records(pool: &SqlitePool, filters: &RecordFilters) -> Result<i64> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM award_records WHERE 1=1");
    push_filter_predicates(&mut qb, filters);

    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Fetch one page of records matching the filters, ordered by sub-award
/// priority ascending with creation order as the stable tie-break
pub async fn fetch_records_page(
    pool: &SqlitePool,
    filters: &RecordFilters,
    limit: i64,
    offset: i64,
) -> Result<Vec<AwardRecord>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM award_records WHERE 1=1",
        RECORD_COLUMNS
    ));
    push_filter_predicates(&mut qb, filters);
    qb.push(" ORDER BY COALESCE(sub_award_priority, 0) ASC, created_at ASC, guid ASC");
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(record_from_row).collect()
}

/// Cascade step for sub-award template deletion: remove every record of
/// this category whose custom sub-award carries the label (and school
/// year, when given). Returns the number of records deleted.
pub async fn delete_matching_sub_award(
    conn: &mut SqliteConnection,
    category_id: Uuid,
    label: &str,
    school_year: Option<Uuid>,
) -> Result<u64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "DELETE FROM award_records WHERE award_category = ",
    );
    qb.push_bind(category_id.to_string());
    qb.push(" AND sub_award_type IN ('custom', 'custom_with_description')");
    qb.push(" AND sub_award_label = ");
    qb.push_bind(label.to_string());
    if let Some(year) = school_year {
        qb.push(" AND sub_award_school_year IS ");
        qb.push_bind(year.to_string());
    }

    let result = qb.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Group matching records by sub-award type: record count plus summed
/// student and class entry counts per group
pub async fn statistics(
    pool: &SqlitePool,
    filters: &RecordFilters,
) -> Result<Vec<SubAwardTypeStats>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT sub_award_type, COUNT(*) AS total_records, \
         COALESCE(SUM(json_array_length(students)), 0) AS total_students, \
         COALESCE(SUM(json_array_length(award_classes)), 0) AS total_classes \
         FROM award_records WHERE 1=1",
    );
    push_filter_predicates(&mut qb, filters);
    qb.push(" GROUP BY sub_award_type ORDER BY sub_award_type ASC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            let kind_str: String = row.try_get("sub_award_type")?;
            let sub_award_type = SubAwardType::parse(&kind_str).ok_or_else(|| {
                Error::Internal(format!("Unknown sub-award type in database: {}", kind_str))
            })?;
            Ok(SubAwardTypeStats {
                sub_award_type,
                total_records: row.try_get("total_records")?,
                total_students: row.try_get("total_students")?,
                total_classes: row.try_get("total_classes")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAwardRecord;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        hoh_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn custom_record(
        category: Uuid,
        label: &str,
        school_year: Option<Uuid>,
        students: Vec<Uuid>,
        priority: Option<i64>,
    ) -> AwardRecord {
        NewAwardRecord {
            award_category: category,
            sub_award: SubAwardInstance {
                kind: SubAwardType::Custom,
                school_year,
                month: None,
                semester: None,
                year: None,
                label: label.to_string(),
                label_eng: None,
                description: None,
                priority,
            },
            students: students.into_iter().map(StudentAwardEntry::new).collect(),
            award_classes: vec![],
            reason: None,
            meta: None,
        }
        .into_record(Utc::now())
    }

    async fn insert(pool: &SqlitePool, record: &AwardRecord) {
        let mut conn = pool.acquire().await.unwrap();
        insert_record(&mut conn, record).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let student = Uuid::new_v4();
        let record = custom_record(category, "March Star", Some(Uuid::new_v4()), vec![student], Some(5));

        insert(&pool, &record).await;

        let loaded = get_record(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.award_category, category);
        assert_eq!(loaded.sub_award.label, "March Star");
        assert_eq!(loaded.sub_award.priority, Some(5));
        assert_eq!(loaded.students.len(), 1);
        assert_eq!(loaded.students[0].student, student);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_update_record_row_reports_missing() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let record = custom_record(category, "March Star", None, vec![Uuid::new_v4()], None);

        // A row that was never inserted (or was deleted underneath the
        // caller) must report false, not silently succeed
        let mut conn = pool.acquire().await.unwrap();
        assert!(!update_record_row(&mut conn, &record).await.unwrap());

        insert_record(&mut conn, &record).await.unwrap();
        let mut updated = record.clone();
        updated.reason = Some("revised".to_string());
        updated.version = 2;
        assert!(update_record_row(&mut conn, &updated).await.unwrap());

        let loaded = get_record(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.reason.as_deref(), Some("revised"));
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_find_matching_records_by_key() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let year = Uuid::new_v4();
        let target = custom_record(category, "March Star", Some(year), vec![Uuid::new_v4()], None);
        let other_label = custom_record(category, "April Star", Some(year), vec![Uuid::new_v4()], None);
        let other_year = custom_record(category, "March Star", Some(Uuid::new_v4()), vec![Uuid::new_v4()], None);

        insert(&pool, &target).await;
        insert(&pool, &other_label).await;
        insert(&pool, &other_year).await;

        let key = SubAwardKey::of(&target);
        let mut conn = pool.acquire().await.unwrap();
        let matches = find_matching_records(&mut conn, &[key.clone()], None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, target.id);

        // Excluding the only match yields nothing
        let matches = find_matching_records(&mut conn, &[key], Some(target.id))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_find_matching_records_null_school_year() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let no_year = custom_record(category, "March Star", None, vec![Uuid::new_v4()], None);
        let with_year = custom_record(category, "March Star", Some(Uuid::new_v4()), vec![Uuid::new_v4()], None);

        insert(&pool, &no_year).await;
        insert(&pool, &with_year).await;

        // A null school-year key matches only the null-year record
        let mut conn = pool.acquire().await.unwrap();
        let matches = find_matching_records(&mut conn, &[SubAwardKey::of(&no_year)], None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, no_year.id);
    }

    #[tokio::test]
    async fn test_filters_student_membership() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let student = Uuid::new_v4();
        let with_student = custom_record(category, "A", None, vec![student, Uuid::new_v4()], None);
        let without_student = custom_record(category, "B", None, vec![Uuid::new_v4()], None);

        insert(&pool, &with_student).await;
        insert(&pool, &without_student).await;

        let filters = RecordFilters {
            student: Some(student),
            ..Default::default()
        };
        assert_eq!(count_records(&pool, &filters).await.unwrap(), 1);

        let page = fetch_records_page(&pool, &filters, 50, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, with_student.id);

        // Absent filters impose no constraint
        let all = fetch_records_page(&pool, &RecordFilters::default(), 50, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_page_ordering_by_priority() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        insert(&pool, &custom_record(category, "Low", None, vec![Uuid::new_v4()], Some(9))).await;
        insert(&pool, &custom_record(category, "High", None, vec![Uuid::new_v4()], Some(1))).await;
        insert(&pool, &custom_record(category, "Unset", None, vec![Uuid::new_v4()], None)).await;

        let page = fetch_records_page(&pool, &RecordFilters::default(), 50, 0)
            .await
            .unwrap();
        let priorities: Vec<i64> = page
            .iter()
            .map(|r| r.sub_award.priority.unwrap_or(0))
            .collect();
        assert_eq!(priorities, vec![0, 1, 9]);
    }

    #[tokio::test]
    async fn test_delete_matching_sub_award_cascade() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        let year = Uuid::new_v4();
        insert(&pool, &custom_record(category, "March Star", Some(year), vec![Uuid::new_v4()], None)).await;
        insert(&pool, &custom_record(category, "March Star", None, vec![Uuid::new_v4()], None)).await;
        insert(&pool, &custom_record(category, "April Star", Some(year), vec![Uuid::new_v4()], None)).await;

        let mut conn = pool.acquire().await.unwrap();
        let deleted = delete_matching_sub_award(&mut conn, category, "March Star", Some(year))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        // Without a school year, every remaining record with that label goes
        let deleted = delete_matching_sub_award(&mut conn, category, "March Star", None)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        assert_eq!(count_records(&pool, &RecordFilters::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_statistics_groups_by_type() {
        let pool = setup_pool().await;
        let category = Uuid::new_v4();
        insert(&pool, &custom_record(category, "A", None, vec![Uuid::new_v4(), Uuid::new_v4()], None)).await;
        insert(&pool, &custom_record(category, "B", None, vec![Uuid::new_v4()], None)).await;

        let mut month_record = custom_record(category, "Monthly", None, vec![Uuid::new_v4()], None);
        month_record.sub_award.kind = SubAwardType::Month;
        month_record.sub_award.month = Some(3);
        insert(&pool, &month_record).await;

        let filters = RecordFilters {
            category: Some(category),
            ..Default::default()
        };
        let stats = statistics(&pool, &filters).await.unwrap();
        assert_eq!(stats.len(), 2);

        let custom = stats
            .iter()
            .find(|s| s.sub_award_type == SubAwardType::Custom)
            .unwrap();
        assert_eq!(custom.total_records, 2);
        assert_eq!(custom.total_students, 3);
        assert_eq!(custom.total_classes, 0);

        let month = stats
            .iter()
            .find(|s| s.sub_award_type == SubAwardType::Month)
            .unwrap();
        assert_eq!(month.total_records, 1);
        assert_eq!(month.total_students, 1);
    }
}
