//! Data models for the honor ledger

pub mod category;
pub mod enriched;
pub mod record;

pub use category::{AwardCategory, NewAwardCategory, SubAwardTemplate, SubAwardType};
pub use enriched::{
    ClassProjection, EnrichedAwardRecord, EnrichedClassEntry, EnrichedStudentEntry,
    PhotoProjection, StudentProjection,
};
pub use record::{
    AwardRecord, ClassAwardEntry, NewAwardRecord, StudentAwardEntry, SubAwardInstance,
};
