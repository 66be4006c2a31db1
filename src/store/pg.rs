/// PostgreSQL log store.
///
/// Every operation opens its own connection and drops it when done; there
/// is no pool and no long-lived transaction. Timestamps are stored as
/// fixed-width RFC 3339 text, so text ordering is chronological.

use postgres::{Client, NoTls};

use crate::model::{LeaderboardEntry, LogRecord, Score, StoreError};
use crate::store::LogStore;

pub const DEFAULT_TABLE: &str = "sensor_logs";

impl From<postgres::Error> for StoreError {
    fn from(err: postgres::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

pub struct PgLogStore {
    url: String,
    table: String,
}

impl PgLogStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// A store writing to a different table, e.g. for isolated tests.
    ///
    /// The name is interpolated into SQL, so only ASCII letters, digits and
    /// underscores are accepted.
    pub fn with_table(url: impl Into<String>, table: &str) -> Result<Self, StoreError> {
        if !is_valid_identifier(table) {
            return Err(StoreError::Query(format!("invalid table name '{}'", table)));
        }
        Ok(Self {
            url: url.into(),
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn connect(&self) -> Result<Client, StoreError> {
        Client::connect(&self.url, NoTls).map_err(|e| StoreError::Connection(e.to_string()))
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                timestamp_utc TEXT NOT NULL,
                location TEXT NOT NULL,
                temperature_f DOUBLE PRECISION,
                humidity_pct DOUBLE PRECISION,
                light_lux DOUBLE PRECISION,
                noise_db DOUBLE PRECISION,
                temperature_score DOUBLE PRECISION,
                light_score DOUBLE PRECISION,
                humidity_score DOUBLE PRECISION,
                noise_score DOUBLE PRECISION,
                total_score DOUBLE PRECISION
            )",
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (
                timestamp_utc, location,
                temperature_f, humidity_pct, light_lux, noise_db,
                temperature_score, light_score, humidity_score, noise_score, total_score
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            self.table
        )
    }

    /// Newest row per location (ties broken by insertion order), then best
    /// total first.
    fn leaderboard_sql(&self) -> String {
        format!(
            "SELECT timestamp_utc, location,
                    temperature_score, humidity_score, light_score, noise_score, total_score
             FROM (
                 SELECT DISTINCT ON (location)
                     timestamp_utc, location,
                     temperature_score, humidity_score, light_score, noise_score, total_score
                 FROM {}
                 ORDER BY location, timestamp_utc DESC, id DESC
             ) latest
             ORDER BY total_score DESC NULLS LAST, location",
            self.table
        )
    }
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl LogStore for PgLogStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut client = self.connect()?;
        client.batch_execute(&self.create_table_sql())?;
        Ok(())
    }

    fn append(&self, record: &LogRecord) -> Result<(), StoreError> {
        let mut client = self.connect()?;
        let r = &record.reading;
        let s = &record.scores;
        client.execute(
            self.insert_sql().as_str(),
            &[
                &record.timestamp_utc,
                &record.location,
                &r.temperature_f,
                &r.humidity_pct,
                &r.light_lux,
                &r.noise_db,
                &s.temperature_score.as_f64(),
                &s.light_score.as_f64(),
                &s.humidity_score.as_f64(),
                &s.noise_score.as_f64(),
                &s.total_score.as_f64(),
            ],
        )?;
        Ok(())
    }

    fn latest_per_location(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut client = self.connect()?;
        let rows = client.query(self.leaderboard_sql().as_str(), &[])?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LeaderboardEntry {
                timestamp_utc: row.get(0),
                location: row.get(1),
                temperature_score: Score::from(row.get::<_, Option<f64>>(2)),
                humidity_score: Score::from(row.get::<_, Option<f64>>(3)),
                light_score: Score::from(row.get::<_, Option<f64>>(4)),
                noise_score: Score::from(row.get::<_, Option<f64>>(5)),
                total_score: Score::from(row.get::<_, Option<f64>>(6)),
            });
        }

        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
