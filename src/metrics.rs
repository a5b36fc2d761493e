// ═══════════════════════════════════════════════════════════════
// INGEST METRICS - Counting every row we touched
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters for one import run. Nothing here blocks, so the writer
// and the pipeline can bump them from wherever they happen to be.
//
// At the end of a run the snapshot is logged as JSON, which is also the
// easiest way to answer "did the re-import actually do nothing?": every
// row should land in a *_duplicate counter.

use std::time::{Duration, Instant};

use portable_atomic::{AtomicF64, AtomicU64, Ordering};
use serde::Serialize;

use crate::store::InsertOutcome;

/// Which of the three persisted tables a write targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Athlete,
    Meet,
    Performance,
}

/// The metrics snapshot - what gets serialized to JSON
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub queries_completed: u64,
    pub queries_failed: u64,
    pub queries_skipped: u64,
    pub rows_extracted: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub athletes_inserted: u64,
    pub athletes_duplicate: u64,
    pub meets_inserted: u64,
    pub meets_duplicate: u64,
    pub performances_inserted: u64,
    pub performances_duplicate: u64,
    pub seen_cache_hits: u64,
    pub slowest_query_seconds: f64,
    pub uptime_seconds: u64,
    pub records_per_minute: f64,
}

struct InsertCounters {
    inserted: AtomicU64,
    duplicate: AtomicU64,
}

impl InsertCounters {
    const fn new() -> Self {
        Self {
            inserted: AtomicU64::new(0),
            duplicate: AtomicU64::new(0),
        }
    }

    fn count(&self, outcome: InsertOutcome) {
        let counter = match outcome {
            InsertOutcome::Inserted => &self.inserted,
            InsertOutcome::AlreadyPresent => &self.duplicate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> (u64, u64) {
        (
            self.inserted.load(Ordering::Relaxed),
            self.duplicate.load(Ordering::Relaxed),
        )
    }
}

/// Lock-free counters for one ingest run.
pub struct IngestMetrics {
    queries_completed: AtomicU64,
    queries_failed: AtomicU64,
    queries_skipped: AtomicU64,
    rows_extracted: AtomicU64,
    records_written: AtomicU64,
    records_failed: AtomicU64,
    athletes: InsertCounters,
    meets: InsertCounters,
    performances: InsertCounters,
    seen_cache_hits: AtomicU64,
    slowest_query_seconds: AtomicF64,
    start_time: Instant,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            queries_completed: AtomicU64::new(0),
            queries_failed: AtomicU64::new(0),
            queries_skipped: AtomicU64::new(0),
            rows_extracted: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            athletes: InsertCounters::new(),
            meets: InsertCounters::new(),
            performances: InsertCounters::new(),
            seen_cache_hits: AtomicU64::new(0),
            slowest_query_seconds: AtomicF64::new(0.0),
            start_time: Instant::now(),
        }
    }

    pub fn query_completed(&self, elapsed: Duration) {
        self.queries_completed.fetch_add(1, Ordering::Relaxed);
        self.slowest_query_seconds
            .fetch_max(elapsed.as_secs_f64(), Ordering::Relaxed);
    }

    pub fn query_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queries_skipped(&self, n: u64) {
        self.queries_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn rows_extracted(&self, n: u64) {
        self.rows_extracted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn seen_cache_hit(&self) {
        self.seen_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_insert(&self, kind: RowKind, outcome: InsertOutcome) {
        match kind {
            RowKind::Athlete => self.athletes.count(outcome),
            RowKind::Meet => self.meets.count(outcome),
            RowKind::Performance => self.performances.count(outcome),
        }
    }

    /// True once any query or record has failed. Drives the exit code.
    pub fn has_failures(&self) -> bool {
        self.queries_failed.load(Ordering::Relaxed) > 0
            || self.records_failed.load(Ordering::Relaxed) > 0
    }

    /// Take a snapshot of all metrics (lock-free reads)
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed();
        let records_written = self.records_written.load(Ordering::Relaxed);
        let records_per_minute = if uptime.as_secs_f64() > 0.0 {
            records_written as f64 / uptime.as_secs_f64() * 60.0
        } else {
            0.0
        };

        let (athletes_inserted, athletes_duplicate) = self.athletes.load();
        let (meets_inserted, meets_duplicate) = self.meets.load();
        let (performances_inserted, performances_duplicate) = self.performances.load();

        MetricsSnapshot {
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_skipped: self.queries_skipped.load(Ordering::Relaxed),
            rows_extracted: self.rows_extracted.load(Ordering::Relaxed),
            records_written,
            records_failed: self.records_failed.load(Ordering::Relaxed),
            athletes_inserted,
            athletes_duplicate,
            meets_inserted,
            meets_duplicate,
            performances_inserted,
            performances_duplicate,
            seen_cache_hits: self.seen_cache_hits.load(Ordering::Relaxed),
            slowest_query_seconds: self.slowest_query_seconds.load(Ordering::Relaxed),
            uptime_seconds: uptime.as_secs(),
            records_per_minute,
        }
    }
}
