//! Read-only batch lookups against the collaborator collections
//!
//! The enrichment pipeline resolves everything by id set (or by
//! (student, school_year) pair set) so the number of round-trips stays
//! constant regardless of how many records are being enriched.

use crate::models::{ClassProjection, PhotoProjection, StudentProjection};
use chrono::{DateTime, Utc};
use hoh_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn class_from_row(row: &SqliteRow) -> Result<ClassProjection> {
    let guid: String = row.try_get("guid")?;
    Ok(ClassProjection {
        id: parse_uuid(&guid)?,
        class_name: row.try_get("class_name")?,
        grade: row.try_get("grade")?,
        class_image: row.try_get("class_image")?,
    })
}

fn photo_from_row(row: &SqliteRow) -> Result<PhotoProjection> {
    let guid: String = row.try_get("guid")?;
    let student: Option<String> = row.try_get("student")?;
    let school_year: Option<String> = row.try_get("school_year")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(PhotoProjection {
        id: parse_uuid(&guid)?,
        student: student.as_deref().map(parse_uuid).transpose()?,
        school_year: school_year.as_deref().map(parse_uuid).transpose()?,
        photo_url: row.try_get("photo_url")?,
        created_at,
    })
}

/// Resolve student projections for an id set
pub async fn load_students(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, StudentProjection>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT guid, name, student_code FROM students WHERE guid IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    let mut students = HashMap::with_capacity(rows.len());
    for row in &rows {
        let guid: String = row.try_get("guid")?;
        let id = parse_uuid(&guid)?;
        students.insert(
            id,
            StudentProjection {
                id,
                name: row.try_get("name")?,
                student_code: row.try_get("student_code")?,
            },
        );
    }
    Ok(students)
}

/// Resolve class projections for an id set
pub async fn load_classes(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, ClassProjection>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT guid, class_name, grade, class_image FROM classes WHERE guid IN (",
    );
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    let mut classes = HashMap::with_capacity(rows.len());
    for row in &rows {
        let class = class_from_row(row)?;
        classes.insert(class.id, class);
    }
    Ok(classes)
}

/// Latest schoolyear-scoped photo per (student, school_year) pair.
/// Only the pairs actually present in the batch are probed; rows arrive
/// newest-first and the first hit per pair wins.
pub async fn load_primary_photos(
    pool: &SqlitePool,
    pairs: &[(Uuid, Uuid)],
) -> Result<HashMap<(Uuid, Uuid), PhotoProjection>> {
    if pairs.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT guid, student, school_year, photo_url, created_at FROM photos WHERE (",
    );
    for (i, (student, school_year)) in pairs.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(student = ");
        qb.push_bind(student.to_string());
        qb.push(" AND school_year = ");
        qb.push_bind(school_year.to_string());
        qb.push(")");
    }
    qb.push(") ORDER BY created_at DESC");

    let rows = qb.build().fetch_all(pool).await?;
    let mut photos = HashMap::new();
    for row in &rows {
        let photo = photo_from_row(row)?;
        if let (Some(student), Some(school_year)) = (photo.student, photo.school_year) {
            photos.entry((student, school_year)).or_insert(photo);
        }
    }
    Ok(photos)
}

/// Latest photo per student with no school-year constraint (fallback when
/// no schoolyear-scoped photo exists)
pub async fn load_fallback_photos(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, PhotoProjection>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT guid, student, school_year, photo_url, created_at FROM photos WHERE student IN (",
    );
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    qb.push(") ORDER BY created_at DESC");

    let rows = qb.build().fetch_all(pool).await?;
    let mut photos = HashMap::new();
    for row in &rows {
        let photo = photo_from_row(row)?;
        if let Some(student) = photo.student {
            photos.entry(student).or_insert(photo);
        }
    }
    Ok(photos)
}

/// Current class per (student, school_year) pair, expanded through the
/// enrollment table. A pair with no enrollment is simply absent; a pair
/// with more than one enrollment is ambiguous and dropped (callers render
/// it as "no current class", not an error).
pub async fn load_current_classes(
    pool: &SqlitePool,
    pairs: &[(Uuid, Uuid)],
) -> Result<HashMap<(Uuid, Uuid), ClassProjection>> {
    if pairs.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT e.student AS student, e.school_year AS school_year, \
         c.guid, c.class_name, c.grade, c.class_image \
         FROM enrollments e JOIN classes c ON c.guid = e.class WHERE (",
    );
    for (i, (student, school_year)) in pairs.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(e.student = ");
        qb.push_bind(student.to_string());
        qb.push(" AND e.school_year = ");
        qb.push_bind(school_year.to_string());
        qb.push(")");
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    let mut resolved: HashMap<(Uuid, Uuid), Option<ClassProjection>> = HashMap::new();
    for row in &rows {
        let student: String = row.try_get("student")?;
        let school_year: String = row.try_get("school_year")?;
        let key = (parse_uuid(&student)?, parse_uuid(&school_year)?);
        let class = class_from_row(row)?;
        resolved
            .entry(key)
            .and_modify(|existing| *existing = None) // ambiguous
            .or_insert(Some(class));
    }

    Ok(resolved
        .into_iter()
        .filter_map(|(key, class)| class.map(|c| (key, c)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        hoh_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    async fn insert_student(pool: &SqlitePool, id: Uuid, name: &str, code: &str) {
        sqlx::query("INSERT INTO students (guid, name, student_code) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(code)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_class(pool: &SqlitePool, id: Uuid, name: &str) {
        sqlx::query("INSERT INTO classes (guid, class_name, grade) VALUES (?, ?, '5')")
            .bind(id.to_string())
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_photo(
        pool: &SqlitePool,
        student: Uuid,
        school_year: Uuid,
        url: &str,
        created_at: DateTime<Utc>,
    ) {
        sqlx::query(
            "INSERT INTO photos (guid, student, school_year, photo_url, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(student.to_string())
        .bind(school_year.to_string())
        .bind(url)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_load_students_by_id_set() {
        let pool = setup_pool().await;
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        insert_student(&pool, s1, "An", "SC-001").await;
        insert_student(&pool, s2, "Binh", "SC-002").await;
        insert_student(&pool, Uuid::new_v4(), "Chi", "SC-003").await;

        let students = load_students(&pool, &[s1, s2]).await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[&s1].name, "An");
        assert_eq!(students[&s2].student_code, "SC-002");

        assert!(load_students(&pool, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primary_photo_latest_per_pair() {
        let pool = setup_pool().await;
        let student = Uuid::new_v4();
        let year = Uuid::new_v4();
        let t0 = Utc::now() - chrono::Duration::days(2);
        let t1 = Utc::now();
        insert_photo(&pool, student, year, "old.jpg", t0).await;
        insert_photo(&pool, student, year, "new.jpg", t1).await;

        let photos = load_primary_photos(&pool, &[(student, year)]).await.unwrap();
        assert_eq!(photos[&(student, year)].photo_url, "new.jpg");

        // A pair with no photos is simply absent
        let photos = load_primary_photos(&pool, &[(student, Uuid::new_v4())])
            .await
            .unwrap();
        assert!(photos.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_photo_ignores_school_year() {
        let pool = setup_pool().await;
        let student = Uuid::new_v4();
        let t0 = Utc::now() - chrono::Duration::days(30);
        let t1 = Utc::now();
        insert_photo(&pool, student, Uuid::new_v4(), "older.jpg", t0).await;
        insert_photo(&pool, student, Uuid::new_v4(), "latest.jpg", t1).await;

        let photos = load_fallback_photos(&pool, &[student]).await.unwrap();
        assert_eq!(photos[&student].photo_url, "latest.jpg");
    }

    #[tokio::test]
    async fn test_current_class_resolution() {
        let pool = setup_pool().await;
        let student = Uuid::new_v4();
        let year = Uuid::new_v4();
        let class = Uuid::new_v4();
        insert_class(&pool, class, "5A").await;
        sqlx::query(
            "INSERT INTO enrollments (guid, student, class, school_year, status) \
             VALUES (?, ?, ?, ?, 'active')",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(student.to_string())
        .bind(class.to_string())
        .bind(year.to_string())
        .execute(&pool)
        .await
        .unwrap();

        let classes = load_current_classes(&pool, &[(student, year)]).await.unwrap();
        assert_eq!(classes[&(student, year)].class_name, "5A");

        // No enrollment for another year: miss, not an error
        let classes = load_current_classes(&pool, &[(student, Uuid::new_v4())])
            .await
            .unwrap();
        assert!(classes.is_empty());
    }

    #[tokio::test]
    async fn test_current_class_ambiguous_enrollment_dropped() {
        let pool = setup_pool().await;
        let student = Uuid::new_v4();
        let year = Uuid::new_v4();
        for name in ["5A", "5B"] {
            let class = Uuid::new_v4();
            insert_class(&pool, class, name).await;
            sqlx::query(
                "INSERT INTO enrollments (guid, student, class, school_year) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(student.to_string())
            .bind(class.to_string())
            .bind(year.to_string())
            .execute(&pool)
            .await
            .unwrap();
        }

        let classes = load_current_classes(&pool, &[(student, year)]).await.unwrap();
        assert!(classes.is_empty());
    }
}
