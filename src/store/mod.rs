// =============================================================================
// store/mod.rs — WHERE THE ROWS LAND
// =============================================================================
//
// The persistence collaborator is a capability, not an ORM: three
// insert-if-absent operations, one per row kind. A row whose key is already
// present is left exactly as it was and the call reports `AlreadyPresent`.
// That is what makes re-importing an overlapping window safe: the second
// pass is a string of no-ops, never a reconciliation.
//
// Keys:
//   Athletes      athleteID
//   Meets         meetID
//   Performances  (meetID, athleteID, ageGroup, event)
// =============================================================================

pub mod sqlite;

#[cfg(test)]
pub mod memory;

use crate::error::StoreError;
use crate::models::{AthleteRow, MeetRow, PerformanceRow};

pub use sqlite::SqliteStore;

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Insert-if-absent writes for the three row kinds. Each call commits on its
/// own; there is no transaction spanning the three rows of one record.
pub trait RecordStore {
    fn insert_athlete(&self, row: &AthleteRow) -> Result<InsertOutcome, StoreError>;
    fn insert_meet(&self, row: &MeetRow) -> Result<InsertOutcome, StoreError>;
    fn insert_performance(&self, row: &PerformanceRow) -> Result<InsertOutcome, StoreError>;
}
