/// Core data types for the environmental productivity monitor.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond conversions, no I/O, and only types.

use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One snapshot of every environmental sensor.
///
/// Produced fresh on each sample and never mutated afterwards. The only
/// readings that reach the database are the averaged ones produced by an
/// aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity_pct: f64, // 0–100
    pub light_lux: f64,    // >= 0
    pub noise_db: f64,
}

impl Reading {
    /// The reading reported when a window collected no samples.
    pub const fn zeroed() -> Self {
        Self {
            temperature_c: 0.0,
            temperature_f: 0.0,
            humidity_pct: 0.0,
            light_lux: 0.0,
            noise_db: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Score types
// ---------------------------------------------------------------------------

/// A single rounded score, or an explicit marker that it could not be
/// computed (non-finite intermediate, out-of-range value).
///
/// Serializes as a JSON integer or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Value(i64),
    Unavailable,
}

impl Score {
    /// Rounds a raw score to the nearest integer, ties to even.
    pub fn from_raw(raw: f64) -> Self {
        if !raw.is_finite() {
            return Score::Unavailable;
        }
        let rounded = raw.round_ties_even();
        if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
            return Score::Unavailable;
        }
        Score::Value(rounded as i64)
    }

    pub fn value(&self) -> Option<i64> {
        match self {
            Score::Value(v) => Some(*v),
            Score::Unavailable => None,
        }
    }

    /// Column value for a nullable floating-point column.
    pub fn as_f64(&self) -> Option<f64> {
        self.value().map(|v| v as f64)
    }
}

impl From<Option<f64>> for Score {
    fn from(raw: Option<f64>) -> Self {
        raw.map(Score::from_raw).unwrap_or(Score::Unavailable)
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Value(v) => serializer.serialize_i64(*v),
            Score::Unavailable => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(Score::from(raw))
    }
}

/// The five scores derived from one reading.
///
/// `total_score` is the equal-weighted mean of the four component scores,
/// computed before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub temperature_score: Score,
    pub light_score: Score,
    pub humidity_score: Score,
    pub noise_score: Score,
    pub total_score: Score,
}

// ---------------------------------------------------------------------------
// Persisted types
// ---------------------------------------------------------------------------

/// A persisted, location-tagged averaged reading and its scores.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp_utc: String, // RFC 3339, e.g. "2024-05-01T13:00:00.123456+00:00"
    pub location: String,
    pub reading: Reading,
    pub scores: ScoreSet,
}

/// The score columns of the newest record for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub timestamp_utc: String,
    pub location: String,
    pub temperature_score: Score,
    pub humidity_score: Score,
    pub light_score: Score,
    pub noise_score: Score,
    pub total_score: Score,
}

impl LeaderboardEntry {
    pub fn from_record(record: &LogRecord) -> Self {
        Self {
            timestamp_utc: record.timestamp_utc.clone(),
            location: record.location.clone(),
            temperature_score: record.scores.temperature_score,
            humidity_score: record.scores.humidity_score,
            light_score: record.scores.light_score,
            noise_score: record.scores.noise_score,
            total_score: record.scores.total_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by a persistence backend.
#[derive(Debug)]
pub enum StoreError {
    /// The database could not be reached.
    Connection(String),
    /// A statement failed against a reachable database.
    Query(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "Database connection failed: {}", msg),
            StoreError::Query(msg) => write!(f, "Database query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors raised while recording audio for the noise level.
#[derive(Debug, PartialEq)]
pub enum CaptureError {
    /// No capture device, or the capture program could not be started.
    DeviceUnavailable(String),
    /// The capture finished but returned no usable samples.
    Empty,
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Audio device unavailable: {}", msg),
            CaptureError::Empty => write!(f, "Audio capture returned no samples"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Reasons a log-now request does not produce a persisted record.
#[derive(Debug)]
pub enum LogNowError {
    /// The caller did not supply a usable location name.
    InvalidName,
    /// The averaged record could not be persisted.
    Store(StoreError),
}

impl std::fmt::Display for LogNowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogNowError::InvalidName => write!(f, "Missing or invalid 'name'"),
            LogNowError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for LogNowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogNowError::InvalidName => None,
            LogNowError::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for LogNowError {
    fn from(err: StoreError) -> Self {
        LogNowError::Store(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_rounds_half_to_even() {
        assert_eq!(Score::from_raw(2.5), Score::Value(2));
        assert_eq!(Score::from_raw(3.5), Score::Value(4));
        assert_eq!(Score::from_raw(-0.5), Score::Value(0));
        assert_eq!(Score::from_raw(99.6), Score::Value(100));
    }

    #[test]
    fn test_non_finite_scores_are_unavailable() {
        assert_eq!(Score::from_raw(f64::NAN), Score::Unavailable);
        assert_eq!(Score::from_raw(f64::INFINITY), Score::Unavailable);
        assert_eq!(Score::from_raw(f64::NEG_INFINITY), Score::Unavailable);
        assert_eq!(Score::from_raw(1e300), Score::Unavailable);
    }

    #[test]
    fn test_score_serializes_as_number_or_null() {
        let json = serde_json::to_string(&[Score::Value(87), Score::Unavailable]).unwrap();
        assert_eq!(json, "[87,null]");
    }

    #[test]
    fn test_score_deserializes_from_stored_real() {
        let scores: Vec<Score> = serde_json::from_str("[87.0, null, 12]").unwrap();
        assert_eq!(scores, vec![Score::Value(87), Score::Unavailable, Score::Value(12)]);
    }

    #[test]
    fn test_zeroed_reading_has_all_zero_fields() {
        let r = Reading::zeroed();
        assert_eq!(r.temperature_c, 0.0);
        assert_eq!(r.temperature_f, 0.0);
        assert_eq!(r.humidity_pct, 0.0);
        assert_eq!(r.light_lux, 0.0);
        assert_eq!(r.noise_db, 0.0);
    }

    #[test]
    fn test_log_now_error_messages() {
        assert_eq!(LogNowError::InvalidName.to_string(), "Missing or invalid 'name'");
        let err = LogNowError::from(StoreError::Connection("refused".to_string()));
        assert_eq!(err.to_string(), "Database connection failed: refused");
    }
}
