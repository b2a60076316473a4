//! Service modules for the honor ledger

pub mod cache;
pub mod duplicate_guard;
pub mod enrichment;
pub mod ledger;
pub mod query;

pub use cache::{CachePort, MemoryCache};
pub use duplicate_guard::DuplicateGuard;
pub use enrichment::EnrichmentPipeline;
pub use ledger::{CategoryListOptions, HonorLedger, SubAwardDeletion};
pub use query::{PageInfo, PageRequest, RecordPage, DEFAULT_PAGE_SIZE};
