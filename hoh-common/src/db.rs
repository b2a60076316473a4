//! Database access for the honor ledger
//!
//! Owns the connection pool setup and schema creation. The ledger owns the
//! `award_categories` and `award_records` tables; the student, class,
//! enrollment, and photo tables belong to other subsystems and are only
//! read here (batch lookups during enrichment).

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create ledger tables if they don't exist
///
/// Sub-award key dimensions are real columns on `award_records` so that
/// duplicate probes, filters, ordering, and statistics run in SQL; the full
/// sub-award payload and the embedded student/class entry collections are
/// JSON TEXT columns.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS award_categories (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_eng TEXT NOT NULL,
            description TEXT,
            description_eng TEXT,
            cover_image TEXT,
            sub_awards TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS award_records (
            guid TEXT PRIMARY KEY,
            award_category TEXT NOT NULL,
            sub_award_type TEXT NOT NULL,
            sub_award_label TEXT,
            sub_award_school_year TEXT,
            sub_award_semester INTEGER,
            sub_award_month INTEGER,
            sub_award_priority INTEGER,
            sub_award TEXT NOT NULL,
            students TEXT NOT NULL DEFAULT '[]',
            award_classes TEXT NOT NULL DEFAULT '[]',
            reason TEXT,
            meta TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_award_records_sub_award_key
        ON award_records (award_category, sub_award_type, sub_award_label, sub_award_school_year)
        "#,
    )
    .execute(pool)
    .await?;

    // Collaborator tables (read-only for the ledger)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            student_code TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            guid TEXT PRIMARY KEY,
            class_name TEXT NOT NULL,
            grade TEXT,
            class_image TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            guid TEXT PRIMARY KEY,
            student TEXT NOT NULL,
            class TEXT NOT NULL,
            school_year TEXT NOT NULL,
            status TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            guid TEXT PRIMARY KEY,
            student TEXT,
            class TEXT,
            school_year TEXT NOT NULL,
            photo_url TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}
