/// In-process log store.
///
/// Same semantics as the database backend without a server: used by
/// `--dev` mode and by tests. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::model::{LeaderboardEntry, LogRecord, StoreError};
use crate::store::{LogStore, compare_totals};

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every appended record, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogStore for MemoryLogStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn append(&self, record: &LogRecord) -> Result<(), StoreError> {
        self.lock().push(record.clone());
        Ok(())
    }

    fn latest_per_location(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let records = self.lock();

        // Later appends win timestamp ties, matching `id DESC` in SQL.
        let mut latest: HashMap<&str, &LogRecord> = HashMap::new();
        for record in records.iter() {
            match latest.get(record.location.as_str()) {
                Some(current) if current.timestamp_utc > record.timestamp_utc => {}
                _ => {
                    latest.insert(record.location.as_str(), record);
                }
            }
        }

        let mut entries: Vec<LeaderboardEntry> = latest
            .into_values()
            .map(LeaderboardEntry::from_record)
            .collect();
        // Location order first so equal totals are reported deterministically.
        entries.sort_by(|a, b| a.location.cmp(&b.location));
        entries.sort_by(compare_totals);
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Reading, Score, ScoreSet};

    fn record(location: &str, timestamp: &str, total: Score) -> LogRecord {
        LogRecord {
            timestamp_utc: timestamp.to_string(),
            location: location.to_string(),
            reading: Reading::zeroed(),
            scores: ScoreSet {
                temperature_score: Score::Value(90),
                light_score: Score::Value(90),
                humidity_score: Score::Value(90),
                noise_score: Score::Value(90),
                total_score: total,
            },
        }
    }

    fn locations(store: &MemoryLogStore) -> Vec<String> {
        store
            .latest_per_location()
            .unwrap()
            .into_iter()
            .map(|e| e.location)
            .collect()
    }

    #[test]
    fn test_empty_store_has_empty_leaderboard() {
        assert!(MemoryLogStore::new().latest_per_location().unwrap().is_empty());
    }

    #[test]
    fn test_leaderboard_orders_by_total_descending() {
        let store = MemoryLogStore::new();
        store.append(&record("A", "2024-05-01T13:00:00.000000+00:00", Score::Value(80))).unwrap();
        store.append(&record("B", "2024-05-01T13:01:00.000000+00:00", Score::Value(90))).unwrap();
        assert_eq!(locations(&store), vec!["B", "A"]);
    }

    #[test]
    fn test_newer_record_replaces_older_for_same_location() {
        let store = MemoryLogStore::new();
        store.append(&record("A", "2024-05-01T13:00:00.000000+00:00", Score::Value(80))).unwrap();
        store.append(&record("B", "2024-05-01T13:01:00.000000+00:00", Score::Value(90))).unwrap();
        store.append(&record("A", "2024-05-01T13:02:00.000000+00:00", Score::Value(95))).unwrap();

        let board = store.latest_per_location().unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].location, "A");
        assert_eq!(board[0].total_score, Score::Value(95));
        assert_eq!(board[1].location, "B");
    }

    #[test]
    fn test_out_of_order_append_keeps_newest_timestamp() {
        let store = MemoryLogStore::new();
        store.append(&record("A", "2024-05-01T13:05:00.000000+00:00", Score::Value(70))).unwrap();
        store.append(&record("A", "2024-05-01T13:00:00.000000+00:00", Score::Value(99))).unwrap();

        let board = store.latest_per_location().unwrap();
        assert_eq!(board[0].total_score, Score::Value(70));
    }

    #[test]
    fn test_missing_total_sorts_last() {
        let store = MemoryLogStore::new();
        store.append(&record("A", "2024-05-01T13:00:00.000000+00:00", Score::Unavailable)).unwrap();
        store.append(&record("B", "2024-05-01T13:00:00.000000+00:00", Score::Value(10))).unwrap();
        assert_eq!(locations(&store), vec!["B", "A"]);
    }

    #[test]
    fn test_records_are_kept_in_append_order() {
        let store = MemoryLogStore::new();
        store.append(&record("A", "2024-05-01T13:00:00.000000+00:00", Score::Value(1))).unwrap();
        store.append(&record("A", "2024-05-01T13:01:00.000000+00:00", Score::Value(2))).unwrap();
        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].scores.total_score, Score::Value(2));
    }
}
