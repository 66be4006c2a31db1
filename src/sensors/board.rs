/// Sensors on a Linux single-board computer.
///
/// The environmental sensor (temperature, humidity) and the light sensor are
/// read through the attribute files their kernel IIO drivers expose; the CPU
/// temperature comes from the thermal zone. Driver setup is the kernel's job.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{NoiseConfig, SensorConfig};
use crate::logging::{self, Subsystem};
use crate::sensors::noise::{ArecordCapture, AudioCapture, NoiseMeter};
use crate::sensors::{SensorSource, compensate_temperature};

// ---------------------------------------------------------------------------
// Attribute files
// ---------------------------------------------------------------------------

/// Reads a numeric sysfs attribute and applies its scale.
pub fn read_scaled_value(path: &Path, scale: f64) -> io::Result<f64> {
    let text = fs::read_to_string(path)?;
    let raw: f64 = text.trim().parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: '{}' is not a number ({})", path.display(), text.trim(), e),
        )
    })?;
    Ok(raw * scale)
}

/// One sysfs-backed channel that remembers its last good value.
#[derive(Debug)]
pub struct SysfsChannel {
    name: &'static str,
    path: PathBuf,
    scale: f64,
    last_good: f64,
}

impl SysfsChannel {
    pub fn new(name: &'static str, path: impl Into<PathBuf>, scale: f64) -> Self {
        Self {
            name,
            path: path.into(),
            scale,
            last_good: 0.0,
        }
    }

    /// Current value, or the last good one (initially 0.0) if the read fails.
    pub fn read(&mut self) -> f64 {
        match read_scaled_value(&self.path, self.scale) {
            Ok(value) => {
                self.last_good = value;
                value
            }
            Err(e) => {
                logging::warn(
                    Subsystem::Sensor,
                    None,
                    &format!("{} read failed: {}; reusing {}", self.name, e, self.last_good),
                );
                self.last_good
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

pub struct BoardSensors<C: AudioCapture> {
    cpu_temp: SysfsChannel,
    temperature: SysfsChannel,
    humidity: SysfsChannel,
    light: SysfsChannel,
    cpu_comp_factor: f64,
    noise: NoiseMeter<C>,
}

impl BoardSensors<ArecordCapture> {
    /// Board sensors with the microphone read through `arecord`.
    pub fn from_config(sensors: &SensorConfig, noise: &NoiseConfig) -> Self {
        let capture = ArecordCapture {
            device: noise.device.clone(),
        };
        Self::with_capture(sensors, noise, capture)
    }
}

impl<C: AudioCapture> BoardSensors<C> {
    pub fn with_capture(sensors: &SensorConfig, noise: &NoiseConfig, capture: C) -> Self {
        Self {
            cpu_temp: SysfsChannel::new("cpu temperature", &sensors.cpu_temp_path, sensors.cpu_temp_scale),
            temperature: SysfsChannel::new("temperature", &sensors.temperature_path, sensors.temperature_scale),
            humidity: SysfsChannel::new("humidity", &sensors.humidity_path, sensors.humidity_scale),
            light: SysfsChannel::new("light", &sensors.light_path, sensors.light_scale),
            cpu_comp_factor: sensors.cpu_comp_factor,
            noise: NoiseMeter::new(capture, noise),
        }
    }
}

impl<C: AudioCapture> SensorSource for BoardSensors<C> {
    fn temperature_c(&mut self) -> f64 {
        let cpu = self.cpu_temp.read();
        let raw = self.temperature.read();
        compensate_temperature(raw, cpu, self.cpu_comp_factor)
    }

    fn humidity_pct(&mut self) -> f64 {
        self.humidity.read()
    }

    fn light_lux(&mut self) -> f64 {
        self.light.read()
    }

    fn noise_db(&mut self) -> f64 {
        self.noise.measure()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
