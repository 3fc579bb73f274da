pub mod http;
pub mod record;

use anyhow::Result;

pub use record::{CloudProvider, NewRecord, Record, RecordDraft, ScoredRecord};

/// The remote catalog of registered systems. Records are read-only once stored.
pub trait RecordStore: Send + Sync {
    fn all_records(&self) -> Result<Vec<Record>>;
    fn register(&self, record: &NewRecord) -> Result<Record>;
}
