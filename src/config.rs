/// Service configuration.
///
/// Settings come from a TOML file (default `envmon.toml`) in which every
/// field is optional, so a missing file simply means defaults. The database
/// URL is taken from `DATABASE_URL` (loaded from `.env` when present) before
/// falling back to `[database] url`.

use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::logging::LogLevel;

pub const DEFAULT_CONFIG_PATH: &str = "envmon.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub aggregation: AggregationSettings,
    pub scoring: ScoringConfig,
    pub sensors: SensorConfig,
    pub noise: NoiseConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; all interfaces so the API is reachable on the LAN.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    /// Unknown level strings fall back to Info.
    pub fn min_level(&self) -> LogLevel {
        self.level.parse().unwrap_or(LogLevel::Info)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    pub window_secs: f64,
    pub sample_interval_secs: f64,
    /// Used when a log request supplies a blank location.
    pub default_location: String,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            window_secs: 5.0,
            sample_interval_secs: 1.0,
            default_location: "Bedroom".to_string(),
        }
    }
}

impl AggregationSettings {
    /// Negative or non-finite values are treated as zero.
    pub fn window(&self) -> Duration {
        secs_to_duration(self.window_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        secs_to_duration(self.sample_interval_secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub optimal_lux: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            optimal_lux: crate::scoring::DEFAULT_OPTIMAL_LUX,
        }
    }
}

/// Locations of the kernel-exposed sensor attributes.
///
/// Each value file is multiplied by its scale: the BME280 IIO driver
/// reports milli-°C and milli-%RH, the thermal zone reports milli-°C.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub cpu_temp_path: String,
    pub cpu_temp_scale: f64,
    /// Adjust until the compensated temperature matches a real thermometer.
    pub cpu_comp_factor: f64,
    pub temperature_path: String,
    pub temperature_scale: f64,
    pub humidity_path: String,
    pub humidity_scale: f64,
    pub light_path: String,
    pub light_scale: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            cpu_temp_path: "/sys/class/thermal/thermal_zone0/temp".to_string(),
            cpu_temp_scale: 0.001,
            cpu_comp_factor: 1.5,
            temperature_path: "/sys/bus/iio/devices/iio:device0/in_temp_input".to_string(),
            temperature_scale: 0.001,
            humidity_path: "/sys/bus/iio/devices/iio:device0/in_humidityrelative_input".to_string(),
            humidity_scale: 0.001,
            light_path: "/sys/bus/iio/devices/iio:device1/in_illuminance_input".to_string(),
            light_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub calibration_offset: f64,
    /// Reported when the microphone cannot be read; a quiet-room baseline.
    pub fallback_db: f64,
    pub sample_rate: u32,
    pub capture_secs: f64,
    pub device: Option<String>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            calibration_offset: 70.0,
            fallback_db: 37.8,
            sample_rate: 44_100,
            capture_secs: 0.1,
            device: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration from TOML text.
pub fn parse_config(text: &str) -> Result<AppConfig, Box<dyn Error>> {
    let config: AppConfig = toml::from_str(text)?;
    Ok(config)
}

/// Loads configuration from `path`; a missing file yields defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, Box<dyn Error>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
    parse_config(&text).map_err(|e| format!("Failed to parse config {}: {}", path.display(), e).into())
}

impl AppConfig {
    /// `DATABASE_URL` from the environment (after `.env`), else the file value.
    pub fn database_url(&self) -> Option<String> {
        dotenv::dotenv().ok();
        env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.database.url.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
