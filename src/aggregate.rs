/// Aggregation windows: many instantaneous samples in, one averaged record out.
///
/// A window samples the sensors once per interval for a fixed wall-clock
/// duration, averages every field, and scores the mean. `log_now` wraps one
/// window with the sensor lock and persistence; the record is written only
/// after the whole window has completed.
///
/// # Clock injection
/// The sampling loop reads time and sleeps through a [`Clock`], so tests can
/// run a five-second window instantly and deterministically.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

use crate::config::{AggregationSettings, ScoringConfig};
use crate::logging;
use crate::model::{LogNowError, LogRecord, Reading, ScoreSet};
use crate::scoring;
use crate::sensors::{SensorLock, SensorSource};
use crate::store::LogStore;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    /// Monotonic time, for measuring the window.
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
    /// Wall-clock time, for the persisted timestamp.
    fn utc_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub window: Duration,
    pub sample_interval: Duration,
    pub default_location: String,
    pub optimal_lux: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::from_settings(&AggregationSettings::default(), &ScoringConfig::default())
    }
}

impl AggregationConfig {
    pub fn from_settings(settings: &AggregationSettings, scoring: &ScoringConfig) -> Self {
        Self {
            window: settings.window(),
            sample_interval: settings.sample_interval(),
            default_location: settings.default_location.clone(),
            optimal_lux: scoring.optimal_lux,
        }
    }
}

/// The outcome of one completed window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub location: String,
    /// Captured after sampling finished, not when it started.
    pub timestamp_utc: String,
    pub reading: Reading,
    pub scores: ScoreSet,
    pub sample_count: usize,
}

impl WindowSummary {
    pub fn to_record(&self) -> LogRecord {
        LogRecord {
            timestamp_utc: self.timestamp_utc.clone(),
            location: self.location.clone(),
            reading: self.reading,
            scores: self.scores,
        }
    }
}

/// Formats a timestamp the way it is persisted: RFC 3339, microseconds,
/// explicit `+00:00`. Fixed width keeps text ordering chronological.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The name exactly as given if it has any visible characters, else the
/// default. Surrounding whitespace is kept, so " Lab" and "Lab" are distinct.
pub fn resolve_location(requested: Option<&str>, default_location: &str) -> String {
    match requested {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => default_location.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Averaging
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ReadingTotals {
    temperature_c: f64,
    temperature_f: f64,
    humidity_pct: f64,
    light_lux: f64,
    noise_db: f64,
    count: usize,
}

impl ReadingTotals {
    fn add(&mut self, r: &Reading) {
        self.temperature_c += r.temperature_c;
        self.temperature_f += r.temperature_f;
        self.humidity_pct += r.humidity_pct;
        self.light_lux += r.light_lux;
        self.noise_db += r.noise_db;
        self.count += 1;
    }

    /// Arithmetic mean of every field; all zeros when nothing was sampled.
    fn mean(&self) -> Reading {
        if self.count == 0 {
            return Reading::zeroed();
        }
        let n = self.count as f64;
        Reading {
            temperature_c: self.temperature_c / n,
            temperature_f: self.temperature_f / n,
            humidity_pct: self.humidity_pct / n,
            light_lux: self.light_lux / n,
            noise_db: self.noise_db / n,
        }
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Samples `source` until `config.window` has elapsed, then averages and
/// scores. No persistence.
///
/// Each iteration takes one reading and sleeps one interval, so a window
/// shorter than the interval still takes one sample; a zero window takes
/// none.
pub fn run_window(
    source: &mut dyn SensorSource,
    clock: &dyn Clock,
    config: &AggregationConfig,
    location: &str,
) -> WindowSummary {
    let start = clock.now();
    let mut totals = ReadingTotals::default();

    while clock.now().duration_since(start) < config.window {
        totals.add(&source.reading());
        clock.sleep(config.sample_interval);
    }

    let reading = totals.mean();
    WindowSummary {
        location: location.to_string(),
        timestamp_utc: format_timestamp(clock.utc_now()),
        scores: scoring::calculate_scores_with(&reading, config.optimal_lux),
        reading,
        sample_count: totals.count,
    }
}

/// Runs one window under the sensor lock and appends exactly one record.
///
/// The lock is held only while sampling. If persistence fails nothing is
/// written and the error is returned.
pub fn log_now(
    sensors: &SensorLock,
    store: &dyn LogStore,
    clock: &dyn Clock,
    config: &AggregationConfig,
    location: Option<&str>,
) -> Result<WindowSummary, LogNowError> {
    let location = resolve_location(location, &config.default_location);

    let summary = {
        let mut guard = sensors.acquire();
        run_window(&mut *guard, clock, config, &location)
    };
    logging::log_window_summary(&summary);

    let record = summary.to_record();
    let persisted = store.ensure_schema().and_then(|_| store.append(&record));
    if let Err(e) = persisted {
        logging::log_store_failure(Some(&location), "append", &e);
        return Err(LogNowError::Store(e));
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
