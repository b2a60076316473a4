//! Award category store
//!
//! Sub-award templates are embedded value objects: the whole template list
//! is serialized into the `sub_awards` JSON column, never written as rows
//! of their own.

use crate::models::{AwardCategory, SubAwardTemplate};
use chrono::{DateTime, Utc};
use hoh_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "guid, name, name_eng, description, description_eng, cover_image, \
     sub_awards, is_active, created_at, updated_at";

fn category_from_row(row: &SqliteRow) -> Result<AwardCategory> {
    let guid: String = row.try_get("guid")?;
    let sub_awards_json: String = row.try_get("sub_awards")?;
    let sub_awards: Vec<SubAwardTemplate> = serde_json::from_str(&sub_awards_json)
        .map_err(|e| Error::Internal(format!("Invalid sub_awards JSON in database: {}", e)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(AwardCategory {
        id: Uuid::parse_str(&guid)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        name: row.try_get("name")?,
        name_eng: row.try_get("name_eng")?,
        description: row.try_get("description")?,
        description_eng: row.try_get("description_eng")?,
        cover_image: row.try_get("cover_image")?,
        sub_awards,
        is_active: row.try_get("is_active")?,
        created_at,
        updated_at,
    })
}

/// Save a new category
pub async fn insert_category(pool: &SqlitePool, category: &AwardCategory) -> Result<()> {
    let sub_awards_json = serde_json::to_string(&category.sub_awards)
        .map_err(|e| Error::Internal(format!("Failed to serialize sub_awards: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO award_categories (
            guid, name, name_eng, description, description_eng, cover_image,
            sub_awards, is_active, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(category.id.to_string())
    .bind(&category.name)
    .bind(&category.name_eng)
    .bind(&category.description)
    .bind(&category.description_eng)
    .bind(&category.cover_image)
    .bind(sub_awards_json)
    .bind(category.is_active)
    .bind(category.created_at)
    .bind(category.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one category by id
pub async fn get_category(pool: &SqlitePool, id: Uuid) -> Result<Option<AwardCategory>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM award_categories WHERE guid = ?",
        CATEGORY_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(category_from_row).transpose()
}

/// List categories, optionally restricted to active ones
pub async fn list_categories(pool: &SqlitePool, active_only: bool) -> Result<Vec<AwardCategory>> {
    let sql = if active_only {
        format!(
            "SELECT {} FROM award_categories WHERE is_active = 1 ORDER BY created_at ASC, guid ASC",
            CATEGORY_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM award_categories ORDER BY created_at ASC, guid ASC",
            CATEGORY_COLUMNS
        )
    };

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(category_from_row).collect()
}

/// Batch load categories by id set (enrichment join)
pub async fn load_categories_by_ids(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<Vec<AwardCategory>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM award_categories WHERE guid IN (",
        CATEGORY_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(category_from_row).collect()
}

/// Replace the mutable fields of a category; returns false when missing
pub async fn update_category(pool: &SqlitePool, category: &AwardCategory) -> Result<bool> {
    let sub_awards_json = serde_json::to_string(&category.sub_awards)
        .map_err(|e| Error::Internal(format!("Failed to serialize sub_awards: {}", e)))?;

    let result = sqlx::query(
        r#"
        UPDATE award_categories SET
            name = ?, name_eng = ?, description = ?, description_eng = ?,
            cover_image = ?, sub_awards = ?, is_active = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&category.name)
    .bind(&category.name_eng)
    .bind(&category.description)
    .bind(&category.description_eng)
    .bind(&category.cover_image)
    .bind(sub_awards_json)
    .bind(category.is_active)
    .bind(category.updated_at)
    .bind(category.id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a category; returns false when missing
pub async fn delete_category(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM award_categories WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove matching custom sub-award templates from a category, inside the
/// caller's cascade transaction. Matches custom/custom_with_description
/// templates by label, and by school year only when one is given. Returns
/// the number of templates removed, or None when the category is missing.
pub async fn remove_sub_award_templates(
    conn: &mut SqliteConnection,
    category_id: Uuid,
    label: &str,
    school_year: Option<Uuid>,
) -> Result<Option<usize>> {
    let row = sqlx::query("SELECT sub_awards FROM award_categories WHERE guid = ?")
        .bind(category_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let sub_awards_json: String = row.try_get("sub_awards")?;
    let sub_awards: Vec<SubAwardTemplate> = serde_json::from_str(&sub_awards_json)
        .map_err(|e| Error::Internal(format!("Invalid sub_awards JSON in database: {}", e)))?;

    let before = sub_awards.len();
    let kept: Vec<SubAwardTemplate> = sub_awards
        .into_iter()
        .filter(|t| {
            let matches = t.kind.is_custom()
                && t.label == label
                && (school_year.is_none() || t.school_year == school_year);
            !matches
        })
        .collect();
    let removed = before - kept.len();

    if removed > 0 {
        let kept_json = serde_json::to_string(&kept)
            .map_err(|e| Error::Internal(format!("Failed to serialize sub_awards: {}", e)))?;
        sqlx::query("UPDATE award_categories SET sub_awards = ?, updated_at = ? WHERE guid = ?")
            .bind(kept_json)
            .bind(Utc::now())
            .bind(category_id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(Some(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubAwardType;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        hoh_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn sample_category(name: &str, active: bool) -> AwardCategory {
        AwardCategory {
            id: Uuid::new_v4(),
            name: name.to_string(),
            name_eng: format!("{} (EN)", name),
            description: None,
            description_eng: None,
            cover_image: None,
            sub_awards: vec![SubAwardTemplate {
                kind: SubAwardType::Custom,
                school_year: None,
                month: None,
                semester: None,
                year: None,
                label: "March Star".to_string(),
                label_eng: None,
                description: None,
                description_eng: None,
                award_count: 0,
                priority: Some(5),
            }],
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_category() {
        let pool = setup_pool().await;
        let category = sample_category("Student of the Month", true);

        insert_category(&pool, &category).await.unwrap();

        let loaded = get_category(&pool, category.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Student of the Month");
        assert_eq!(loaded.sub_awards.len(), 1);
        assert_eq!(loaded.sub_awards[0].priority, Some(5));
    }

    #[tokio::test]
    async fn test_list_categories_active_filter() {
        let pool = setup_pool().await;
        insert_category(&pool, &sample_category("Active", true)).await.unwrap();
        insert_category(&pool, &sample_category("Retired", false)).await.unwrap();

        let all = list_categories(&pool, false).await.unwrap();
        assert_eq!(all.len(), 2);

        let active = list_categories(&pool, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Active");
    }

    #[tokio::test]
    async fn test_remove_sub_award_templates() {
        let pool = setup_pool().await;
        let category = sample_category("Honors", true);
        insert_category(&pool, &category).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let removed = remove_sub_award_templates(&mut *conn, category.id, "March Star", None)
            .await
            .unwrap();
        assert_eq!(removed, Some(1));

        let loaded = get_category(&pool, category.id).await.unwrap().unwrap();
        assert!(loaded.sub_awards.is_empty());

        // Unknown label removes nothing
        let removed = remove_sub_award_templates(&mut *conn, category.id, "April Star", None)
            .await
            .unwrap();
        assert_eq!(removed, Some(0));

        // Missing category reported as None
        let removed = remove_sub_award_templates(&mut *conn, Uuid::new_v4(), "March Star", None)
            .await
            .unwrap();
        assert_eq!(removed, None);
    }
}
