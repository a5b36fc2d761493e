// =============================================================================
// writer.rs — ONE RECORD IN, THREE ROWS OUT
// =============================================================================
//
// For each normalized record:
//
//   1. convert the mark text to a number   (nothing is written if this fails)
//   2. Athletes      insert-if-absent on athleteID
//   3. Meets         insert-if-absent on meetID
//   4. Performances  insert-if-absent on (meetID, athleteID, ageGroup, event)
//
// Each write commits on its own. If step 3 fails, the athlete from step 2
// stays. Re-running the record later is safe because every key is natural
// and every insert is a no-op when the key exists.
//
// A typical page has one meet and dozens of athletes who show up again in
// the next age group or year, so the writer keeps a small LRU of keys it has
// already written this run and skips the round trip for those.
// =============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace};

use crate::error::{StoreError, WriteError};
use crate::magnitude::to_magnitude;
use crate::metrics::{IngestMetrics, RowKind};
use crate::models::{AthleteRow, MeetRow, PerformanceRecord, PerformanceRow, Query};
use crate::store::{InsertOutcome, RecordStore};

/// Outcome of each of the three writes for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub athlete: InsertOutcome,
    pub meet: InsertOutcome,
    pub performance: InsertOutcome,
}

pub struct RecordWriter<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    seen_athletes: LruCache<String, ()>,
    seen_meets: LruCache<String, ()>,
    metrics: Arc<IngestMetrics>,
}

impl<'s, S: RecordStore + ?Sized> RecordWriter<'s, S> {
    /// `seen_cache_size` bounds each of the athlete and meet key caches.
    pub fn new(store: &'s S, seen_cache_size: usize, metrics: Arc<IngestMetrics>) -> Self {
        let capacity = NonZeroUsize::new(seen_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            seen_athletes: LruCache::new(capacity),
            seen_meets: LruCache::new(capacity),
            metrics,
        }
    }

    /// Persist one record as its athlete, meet and performance rows.
    pub fn write(
        &mut self,
        record: &PerformanceRecord,
        query: &Query,
    ) -> Result<WriteSummary, WriteError> {
        let magnitude = to_magnitude(&record.performance).map_err(|source| WriteError::Conversion {
            source,
            record: Box::new(record.clone()),
        })?;

        let store_failure = |source: StoreError| WriteError::Store {
            source,
            record: Box::new(record.clone()),
        };

        let athlete = AthleteRow::derive(record, query);
        let athlete = cached_insert(
            &mut self.seen_athletes,
            &self.metrics,
            &athlete.athlete_id,
            || self.store.insert_athlete(&athlete),
        )
        .map_err(store_failure)?;
        self.metrics.count_insert(RowKind::Athlete, athlete);

        let meet = MeetRow::derive(record, query);
        let meet = cached_insert(&mut self.seen_meets, &self.metrics, &meet.meet_id, || {
            self.store.insert_meet(&meet)
        })
        .map_err(store_failure)?;
        self.metrics.count_insert(RowKind::Meet, meet);

        let performance = PerformanceRow::derive(record, query, magnitude);
        let performance = self
            .store
            .insert_performance(&performance)
            .map_err(store_failure)?;
        self.metrics.count_insert(RowKind::Performance, performance);

        trace!(
            athlete_id = %record.athlete_id,
            meet_id = %record.meet_id,
            ?athlete,
            ?meet,
            ?performance,
            "record persisted"
        );

        Ok(WriteSummary {
            athlete,
            meet,
            performance,
        })
    }
}

/// Skip the store when the key was already written this run. Keys only enter
/// the cache after the store accepted them.
fn cached_insert<F>(
    seen: &mut LruCache<String, ()>,
    metrics: &IngestMetrics,
    key: &str,
    insert: F,
) -> Result<InsertOutcome, StoreError>
where
    F: FnOnce() -> Result<InsertOutcome, StoreError>,
{
    if seen.get(key).is_some() {
        metrics.seen_cache_hit();
        debug!(key, "key already written this run");
        return Ok(InsertOutcome::AlreadyPresent);
    }

    let outcome = insert()?;
    seen.put(key.to_string(), ());
    Ok(outcome)
}
