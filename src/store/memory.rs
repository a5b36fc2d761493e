// In-memory RecordStore for tests. Same insert-if-absent contract as SQLite,
// plus a way to make specific meet writes fail so error paths can be driven.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use super::{InsertOutcome, RecordStore};
use crate::error::StoreError;
use crate::models::{AthleteRow, MeetRow, PerformanceRow};
use crate::stats::{SampleSource, StatsQuery};

type PerformanceKey = (String, String, String, String);

#[derive(Default)]
pub struct MemoryStore {
    athletes: RwLock<HashMap<String, AthleteRow>>,
    meets: RwLock<HashMap<String, MeetRow>>,
    performances: RwLock<HashMap<PerformanceKey, PerformanceRow>>,
    rejected_meets: RwLock<HashSet<String>>,
    /// Every store call, in order, as (table, key).
    calls: RwLock<Vec<(&'static str, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future write of this meet id fail.
    pub fn reject_meet(&self, meet_id: &str) {
        self.rejected_meets.write().insert(meet_id.to_string());
    }

    pub fn athlete(&self, id: &str) -> Option<AthleteRow> {
        self.athletes.read().get(id).cloned()
    }

    pub fn meet(&self, id: &str) -> Option<MeetRow> {
        self.meets.read().get(id).cloned()
    }

    pub fn performances(&self) -> Vec<PerformanceRow> {
        let mut rows: Vec<PerformanceRow> = self.performances.read().values().cloned().collect();
        rows.sort_by(|a, b| (&a.meet_id, &a.athlete_id).cmp(&(&b.meet_id, &b.athlete_id)));
        rows
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.athletes.read().len(),
            self.meets.read().len(),
            self.performances.read().len(),
        )
    }

    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.read().clone()
    }

    fn record_call(&self, table: &'static str, key: &str) {
        self.calls.write().push((table, key.to_string()));
    }
}

fn insert_if_absent<K, V>(map: &RwLock<HashMap<K, V>>, key: K, row: &V) -> InsertOutcome
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    let mut map = map.write();
    if map.contains_key(&key) {
        InsertOutcome::AlreadyPresent
    } else {
        map.insert(key, row.clone());
        InsertOutcome::Inserted
    }
}

impl RecordStore for MemoryStore {
    fn insert_athlete(&self, row: &AthleteRow) -> Result<InsertOutcome, StoreError> {
        self.record_call("athlete", &row.athlete_id);
        Ok(insert_if_absent(&self.athletes, row.athlete_id.clone(), row))
    }

    fn insert_meet(&self, row: &MeetRow) -> Result<InsertOutcome, StoreError> {
        self.record_call("meet", &row.meet_id);
        if self.rejected_meets.read().contains(&row.meet_id) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        Ok(insert_if_absent(&self.meets, row.meet_id.clone(), row))
    }

    fn insert_performance(&self, row: &PerformanceRow) -> Result<InsertOutcome, StoreError> {
        self.record_call("performance", &row.meet_id);
        let key = (
            row.meet_id.clone(),
            row.athlete_id.clone(),
            row.age_group.clone(),
            row.event.clone(),
        );
        Ok(insert_if_absent(&self.performances, key, row))
    }
}

impl SampleSource for MemoryStore {
    fn samples(&self, query: &StatsQuery) -> Result<Vec<(i32, f64)>, StoreError> {
        let meets = self.meets.read();
        let samples = self
            .performances
            .read()
            .values()
            .filter(|p| p.event == query.event && p.age_group == query.age_group)
            .filter_map(|p| {
                let meet = meets.get(&p.meet_id)?;
                let in_slice = meet.season == query.season
                    && (query.first_year..=query.last_year).contains(&meet.year);
                in_slice.then_some((meet.year, p.performance))
            })
            .collect();
        Ok(samples)
    }
}
