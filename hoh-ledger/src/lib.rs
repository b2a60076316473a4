//! hoh-ledger library interface
//!
//! The honor ledger core: award taxonomy and record stores, the
//! duplicate-prevention guard, the enrichment/join pipeline, the cache
//! layer, and the query/pagination service. The HTTP layer consuming this
//! crate lives elsewhere; everything here is exposed as plain async APIs.

pub mod db;
pub mod models;
pub mod services;

pub use hoh_common::{ConflictKind, Error, Result};
pub use services::ledger::HonorLedger;
