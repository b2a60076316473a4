//! Store access for the honor ledger
//!
//! `categories` and `records` own the ledger tables; `collaborators` holds
//! the read-only batch lookups against the student, class, enrollment, and
//! photo tables used by the enrichment pipeline.

pub mod categories;
pub mod collaborators;
pub mod records;
