//! Pagination types for record queries
//!
//! Page numbers are 1-based. Out-of-range values are clamped rather than
//! rejected: page 0 or negative becomes page 1, and a page past the end
//! returns an empty slice with truthful totals.

use crate::models::EnrichedAwardRecord;
use serde::{Deserialize, Serialize};

/// Page size applied when the caller does not supply one
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Caller-supplied pagination parameters, both optional
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    /// Clamp to usable values: page >= 1, limit >= 1 (default 50)
    pub fn normalize(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        (page, limit)
    }

    pub fn offset(&self) -> i64 {
        let (page, limit) = self.normalize();
        (page - 1) * limit
    }
}

/// Pagination metadata returned alongside a page of results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl PageInfo {
    pub fn new(request: &PageRequest, total: i64) -> Self {
        let (page, limit) = request.normalize();
        Self {
            page,
            limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

/// One page of enriched records plus its pagination envelope
#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub records: Vec<EnrichedAwardRecord>,
    pub pagination: PageInfo,
}
