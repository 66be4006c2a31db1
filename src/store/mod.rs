/// Persistence for averaged readings.
///
/// Records are append-only. The only query is the leaderboard: the newest
/// record for each location, best total score first.
///
/// Submodules:
/// - `pg` — the PostgreSQL backend, one connection per operation.
/// - `memory` — an in-process backend for dev mode and tests.

pub mod memory;
pub mod pg;

pub use self::memory::MemoryLogStore;
pub use self::pg::PgLogStore;

use std::cmp::Ordering;

use crate::model::{LeaderboardEntry, LogRecord, StoreError};

pub trait LogStore: Send + Sync {
    /// Creates the log table if it does not already exist.
    fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Appends one record.
    fn append(&self, record: &LogRecord) -> Result<(), StoreError>;

    /// The newest record per location (by timestamp), ordered by total
    /// score descending. Records without a total sort last.
    fn latest_per_location(&self) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// Leaderboard ordering: higher total first, missing totals last.
///
/// Used with a stable sort so equal totals keep their incoming order.
pub fn compare_totals(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    match (a.total_score.value(), b.total_score.value()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
