//! Honor ledger service
//!
//! The single entry point for everything the honor ledger does: category
//! taxonomy CRUD, award record creation/update/deletion under the
//! duplicate guard, template cascade deletion, enriched reads, paginated
//! queries, and statistics. Writes run inside transactions and end with a
//! wholesale cache invalidation; reads go through the enrichment pipeline
//! and, for the category list, the cache.

use crate::db::records::{RecordFilters, SubAwardTypeStats};
use crate::db::{categories, records};
use crate::models::{
    AwardCategory, AwardRecord, EnrichedAwardRecord, NewAwardCategory, NewAwardRecord,
    SubAwardInstance, SubAwardType,
};
use crate::services::cache::CachePort;
use crate::services::duplicate_guard::DuplicateGuard;
use crate::services::enrichment::EnrichmentPipeline;
use crate::services::query::{PageInfo, PageRequest, RecordPage};
use chrono::Utc;
use hoh_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Options for listing categories
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryListOptions {
    pub active_only: bool,
}

/// Outcome of a sub-award cascade deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SubAwardDeletion {
    pub templates_removed: usize,
    pub records_deleted: u64,
}

pub struct HonorLedger {
    db: SqlitePool,
    cache: Arc<dyn CachePort>,
    cache_ttl_secs: u64,
    enrichment: EnrichmentPipeline,
}

impl HonorLedger {
    pub fn new(db: SqlitePool, cache: Arc<dyn CachePort>, cache_ttl_secs: u64) -> Self {
        let enrichment = EnrichmentPipeline::new(db.clone());
        Self {
            db,
            cache,
            cache_ttl_secs,
            enrichment,
        }
    }

    // ------------------------------------------------------------------
    // Award records
    // ------------------------------------------------------------------

    /// Create one award record. The record is validated, template fields
    /// are inherited for custom types, entries are deduplicated, and the
    /// duplicate guard must approve it before the insert commits.
    pub async fn create_record(&self, payload: NewAwardRecord) -> Result<AwardRecord> {
        validate_sub_award(&payload.sub_award)?;
        let category = self.require_category(payload.award_category).await?;

        let mut record = payload.into_record(Utc::now());
        inherit_from_template(&category, &mut record.sub_award);
        DuplicateGuard::dedupe_entries(&mut record);

        let mut tx = self.db.begin().await?;
        DuplicateGuard::validate(&mut tx, &[record.clone()], None).await?;
        records::insert_record(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(record = %record.id, label = %record.sub_award.label, "Award record created");
        self.invalidate_cache().await;
        Ok(record)
    }

    /// Create a batch of records atomically: every candidate is validated
    /// against the store and against the rest of the batch, and one
    /// conflict rejects the whole batch with nothing inserted.
    pub async fn create_records(&self, payloads: Vec<NewAwardRecord>) -> Result<Vec<AwardRecord>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut batch = Vec::with_capacity(payloads.len());
        for payload in payloads {
            validate_sub_award(&payload.sub_award)?;
            let category = self.require_category(payload.award_category).await?;
            let mut record = payload.into_record(now);
            inherit_from_template(&category, &mut record.sub_award);
            DuplicateGuard::dedupe_entries(&mut record);
            batch.push(record);
        }

        let mut tx = self.db.begin().await?;
        DuplicateGuard::validate(&mut tx, &batch, None).await?;
        for record in &batch {
            records::insert_record(&mut tx, record).await?;
        }
        tx.commit()
            .await
            .map_err(|e| Error::Consistency(format!("Batch insert failed to commit: {}", e)))?;

        tracing::info!(count = batch.len(), "Award record batch created");
        self.invalidate_cache().await;
        Ok(batch)
    }

    /// Replace a record's mutable fields, bumping its version. The
    /// duplicate invariant is re-enforced with the record itself excluded
    /// from the probe.
    pub async fn update_record(&self, id: Uuid, payload: NewAwardRecord) -> Result<AwardRecord> {
        validate_sub_award(&payload.sub_award)?;
        let existing = records::get_record(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Award record {} not found", id)))?;
        let category = self.require_category(payload.award_category).await?;

        let mut record = AwardRecord {
            id: existing.id,
            award_category: payload.award_category,
            sub_award: payload.sub_award,
            students: payload.students,
            award_classes: payload.award_classes,
            reason: payload.reason,
            meta: payload.meta,
            is_active: existing.is_active,
            version: existing.version + 1,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        inherit_from_template(&category, &mut record.sub_award);
        DuplicateGuard::dedupe_entries(&mut record);

        let mut tx = self.db.begin().await?;
        DuplicateGuard::validate(&mut tx, &[record.clone()], Some(id)).await?;
        // The row can vanish between the lookup above and this write
        if !records::update_record_row(&mut tx, &record).await? {
            return Err(Error::NotFound(format!("Award record {} not found", id)));
        }
        tx.commit().await?;

        tracing::info!(record = %id, version = record.version, "Award record updated");
        self.invalidate_cache().await;
        Ok(record)
    }

    pub async fn delete_record(&self, id: Uuid) -> Result<()> {
        if !records::delete_record(&self.db, id).await? {
            return Err(Error::NotFound(format!("Award record {} not found", id)));
        }
        tracing::info!(record = %id, "Award record deleted");
        self.invalidate_cache().await;
        Ok(())
    }

    /// Load one record, enriched
    pub async fn get_record(&self, id: Uuid) -> Result<EnrichedAwardRecord> {
        let record = records::get_record(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Award record {} not found", id)))?;
        let mut enriched = self.enrichment.enrich(&[record]).await?;
        enriched
            .pop()
            .ok_or_else(|| Error::Internal("Enrichment dropped a record".to_string()))
    }

    /// Query records with optional filters, paginated and enriched
    pub async fn query_records(
        &self,
        filters: &RecordFilters,
        page: PageRequest,
    ) -> Result<RecordPage> {
        let total = records::count_records(&self.db, filters).await?;
        let (_, limit) = page.normalize();
        let rows = records::fetch_records_page(&self.db, filters, limit, page.offset()).await?;
        let enriched = self.enrichment.enrich(&rows).await?;

        Ok(RecordPage {
            records: enriched,
            pagination: PageInfo::new(&page, total),
        })
    }

    /// Aggregate matching records per sub-award type
    pub async fn get_statistics(&self, filters: &RecordFilters) -> Result<Vec<SubAwardTypeStats>> {
        records::statistics(&self.db, filters).await
    }

    /// Remove a custom sub-award from a category: the matching templates
    /// and every record granted under them go in one transaction.
    pub async fn delete_sub_award(
        &self,
        category_id: Uuid,
        label: &str,
        school_year: Option<Uuid>,
    ) -> Result<SubAwardDeletion> {
        let mut tx = self.db.begin().await?;
        let templates_removed =
            categories::remove_sub_award_templates(&mut tx, category_id, label, school_year)
                .await?
                .ok_or_else(|| {
                    Error::NotFound(format!("Award category {} not found", category_id))
                })?;
        let records_deleted =
            records::delete_matching_sub_award(&mut tx, category_id, label, school_year).await?;
        tx.commit().await.map_err(|e| {
            Error::Consistency(format!("Sub-award cascade failed to commit: {}", e))
        })?;

        tracing::info!(
            category = %category_id,
            label,
            templates_removed,
            records_deleted,
            "Sub-award deleted with cascade"
        );
        self.invalidate_cache().await;
        Ok(SubAwardDeletion {
            templates_removed,
            records_deleted,
        })
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub async fn create_category(&self, payload: NewAwardCategory) -> Result<AwardCategory> {
        validate_category(&payload)?;
        let now = Utc::now();
        let category = AwardCategory {
            id: Uuid::new_v4(),
            name: payload.name,
            name_eng: payload.name_eng,
            description: payload.description,
            description_eng: payload.description_eng,
            cover_image: payload.cover_image,
            sub_awards: payload.sub_awards,
            is_active: payload.is_active,
            created_at: now,
            updated_at: now,
        };
        categories::insert_category(&self.db, &category).await?;

        tracing::info!(category = %category.id, name = %category.name, "Award category created");
        self.invalidate_cache().await;
        Ok(category)
    }

    pub async fn get_category(&self, id: Uuid) -> Result<AwardCategory> {
        self.require_category(id).await
    }

    /// List categories, served from the cache within the TTL window
    pub async fn list_categories(&self, options: CategoryListOptions) -> Result<Vec<AwardCategory>> {
        let key = if options.active_only {
            "categories:active"
        } else {
            "categories:all"
        };

        if let Some(cached) = self.cache.get(key).await {
            match serde_json::from_str(&cached) {
                Ok(list) => {
                    tracing::debug!(key, "Category list served from cache");
                    return Ok(list);
                }
                Err(e) => {
                    // Treat a corrupt entry as a miss
                    tracing::warn!(key, error = %e, "Discarding unparseable cache entry");
                }
            }
        }

        let list = categories::list_categories(&self.db, options.active_only).await?;
        if let Ok(json) = serde_json::to_string(&list) {
            self.cache.set(key, json, self.cache_ttl_secs).await;
        }
        Ok(list)
    }

    /// Replace a category's mutable fields, keeping its id and creation time
    pub async fn update_category(
        &self,
        id: Uuid,
        payload: NewAwardCategory,
    ) -> Result<AwardCategory> {
        validate_category(&payload)?;
        let existing = self.require_category(id).await?;

        let category = AwardCategory {
            id,
            name: payload.name,
            name_eng: payload.name_eng,
            description: payload.description,
            description_eng: payload.description_eng,
            cover_image: payload.cover_image,
            sub_awards: payload.sub_awards,
            is_active: payload.is_active,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        if !categories::update_category(&self.db, &category).await? {
            return Err(Error::NotFound(format!("Award category {} not found", id)));
        }

        tracing::info!(category = %id, "Award category updated");
        self.invalidate_cache().await;
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if !categories::delete_category(&self.db, id).await? {
            return Err(Error::NotFound(format!("Award category {} not found", id)));
        }
        tracing::info!(category = %id, "Award category deleted");
        self.invalidate_cache().await;
        Ok(())
    }

    // ------------------------------------------------------------------

    async fn require_category(&self, id: Uuid) -> Result<AwardCategory> {
        categories::get_category(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Award category {} not found", id)))
    }

    /// Both namespaces go together: record mutations change statistics and
    /// award counts visible through category reads, and template edits
    /// change what records inherit.
    async fn invalidate_cache(&self) {
        self.cache.invalidate_pattern("categories:*").await;
        self.cache.invalidate_pattern("records:*").await;
    }
}

/// Reject structurally invalid sub-award payloads before they reach the
/// guard or the store
fn validate_sub_award(sub_award: &SubAwardInstance) -> Result<()> {
    if sub_award.label.trim().is_empty() {
        return Err(Error::Validation("Sub-award label must not be empty".to_string()));
    }
    match sub_award.kind {
        SubAwardType::Month => match sub_award.month {
            Some(1..=12) => Ok(()),
            Some(m) => Err(Error::Validation(format!("Invalid month {}", m))),
            None => Err(Error::Validation(
                "Month sub-awards require a month".to_string(),
            )),
        },
        SubAwardType::Semester => match sub_award.semester {
            Some(1 | 2) => Ok(()),
            Some(s) => Err(Error::Validation(format!("Invalid semester {}", s))),
            None => Err(Error::Validation(
                "Semester sub-awards require a semester".to_string(),
            )),
        },
        SubAwardType::Year => {
            if sub_award.year.is_none() && sub_award.school_year.is_none() {
                return Err(Error::Validation(
                    "Year sub-awards require a year or school year".to_string(),
                ));
            }
            Ok(())
        }
        SubAwardType::Custom | SubAwardType::CustomWithDescription => Ok(()),
    }
}

fn validate_category(payload: &NewAwardCategory) -> Result<()> {
    if payload.name.trim().is_empty() {
        return Err(Error::Validation("Category name must not be empty".to_string()));
    }
    Ok(())
}

/// For custom sub-award types, snapshot `priority` and `label_eng` from the
/// category template matching the instance's type and label. Non-custom
/// types and unknown labels pass through unchanged.
fn inherit_from_template(category: &AwardCategory, sub_award: &mut SubAwardInstance) {
    if !sub_award.kind.is_custom() {
        return;
    }
    if let Some(template) = category.find_template(sub_award.kind, &sub_award.label) {
        if template.priority.is_some() {
            sub_award.priority = template.priority;
        }
        if sub_award.label_eng.is_none() {
            sub_award.label_eng = template.label_eng.clone();
        }
    }
}
