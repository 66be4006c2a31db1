/// Structured logging for the environmental monitoring service
///
/// Provides context-rich logging with subsystem and location identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for daemon operations.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::model::StoreError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subsystem {
    Sensor,
    Window,
    Database,
    Api,
    System,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Sensor => write!(f, "SENSOR"),
            Subsystem::Window => write!(f, "WINDOW"),
            Subsystem::Database => write!(f, "DB"),
            Subsystem::Api => write!(f, "API"),
            Subsystem::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the database has not been provisioned yet
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        let mut slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(logger);
    }

    fn format_entry(level: LogLevel, subsystem: &Subsystem, location: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let location_part = location.map(|l| format!(" [{}]", l)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, subsystem, location_part, message)
    }

    fn log(&self, level: LogLevel, subsystem: &Subsystem, location: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, subsystem, location, message);
        let location_part = location.map(|l| format!(" [{}]", l)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", subsystem, location_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", subsystem, location_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn emit(level: LogLevel, subsystem: Subsystem, location: Option<&str>, message: &str) {
    let guard = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(logger) = guard.as_ref() {
        logger.log(level, &subsystem, location, message);
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(subsystem: Subsystem, location: Option<&str>, message: &str) {
    emit(LogLevel::Info, subsystem, location, message);
}

/// Log a warning message
pub fn warn(subsystem: Subsystem, location: Option<&str>, message: &str) {
    emit(LogLevel::Warning, subsystem, location, message);
}

/// Log an error message
pub fn error(subsystem: Subsystem, location: Option<&str>, message: &str) {
    emit(LogLevel::Error, subsystem, location, message);
}

/// Log a debug message
pub fn debug(subsystem: Subsystem, location: Option<&str>, message: &str) {
    emit(LogLevel::Debug, subsystem, location, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a persistence failure based on the error and what was attempted.
///
/// A leaderboard request against a database that has never been provisioned
/// is normal on first boot; a failed insert never is.
pub fn classify_store_failure(operation: &str, err: &StoreError) -> FailureType {
    match err {
        StoreError::Connection(_) if operation == "leaderboard" => FailureType::Expected,
        StoreError::Connection(_) => FailureType::Unexpected,
        StoreError::Query(msg) if msg.contains("does not exist") => FailureType::Expected,
        StoreError::Query(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a persistence failure with automatic classification
pub fn log_store_failure(location: Option<&str>, operation: &str, err: &StoreError) {
    let failure_type = classify_store_failure(operation, err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Subsystem::Database, location, &message),
        FailureType::Unexpected => error(Subsystem::Database, location, &message),
        FailureType::Unknown => warn(Subsystem::Database, location, &message),
    }
}

// ---------------------------------------------------------------------------
// Window Summary Logging
// ---------------------------------------------------------------------------

/// Log the averages and scores of a completed aggregation window
pub fn log_window_summary(summary: &crate::aggregate::WindowSummary) {
    let r = &summary.reading;
    let message = format!(
        "Averages over {} samples: Temp {:.2} °F | Humidity {:.2} % | Light {:.2} lux | Noise {:.2} dB | Total score {}",
        summary.sample_count,
        r.temperature_f,
        r.humidity_pct,
        r.light_lux,
        r.noise_db,
        summary
            .scores
            .total_score
            .value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
    );

    if summary.sample_count == 0 {
        warn(Subsystem::Window, Some(&summary.location), &message);
    } else {
        info(Subsystem::Window, Some(&summary.location), &message);
    }
}
