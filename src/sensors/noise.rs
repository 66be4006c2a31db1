/// Ambient noise measurement.
///
/// A short audio capture is reduced to its root-mean-square amplitude and
/// converted to a dB-like level with a fixed calibration offset. This is a
/// productivity proxy, not a calibrated sound pressure measurement.

use std::process::Command;

use crate::config::NoiseConfig;
use crate::logging::{self, Subsystem};
use crate::model::CaptureError;

/// RMS amplitudes at or below this are reported as 0 dB instead of
/// taking the logarithm of zero.
pub const RMS_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Root-mean-square amplitude of a sample buffer. An empty buffer is silent.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// `20·log10(rms) + offset`, or exactly 0.0 for a near-silent buffer.
pub fn rms_to_db(rms: f64, calibration_offset: f64) -> f64 {
    if rms <= RMS_EPSILON {
        return 0.0;
    }
    20.0 * rms.log10() + calibration_offset
}

// ---------------------------------------------------------------------------
// Capture seam
// ---------------------------------------------------------------------------

/// Records mono float samples from a microphone.
pub trait AudioCapture: Send {
    fn capture(&mut self, sample_count: usize, sample_rate: u32) -> Result<Vec<f32>, CaptureError>;
}

/// Captures through ALSA's `arecord` as raw little-endian float32 mono.
pub struct ArecordCapture {
    /// ALSA device name, e.g. "plughw:1,0". `None` uses the default device.
    pub device: Option<String>,
}

impl AudioCapture for ArecordCapture {
    fn capture(&mut self, sample_count: usize, sample_rate: u32) -> Result<Vec<f32>, CaptureError> {
        let mut cmd = Command::new("arecord");
        cmd.args(["-q", "-t", "raw", "-f", "FLOAT_LE", "-c", "1"])
            .arg("-r")
            .arg(sample_rate.to_string())
            .arg("-s")
            .arg(sample_count.to_string());
        if let Some(ref device) = self.device {
            cmd.arg("-D").arg(device);
        }

        let output = cmd
            .output()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::DeviceUnavailable(format!(
                "arecord exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let samples = decode_f32_le(&output.stdout);
        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(samples)
    }
}

/// Decodes raw FLOAT_LE bytes; a trailing partial sample is dropped.
pub fn decode_f32_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ---------------------------------------------------------------------------
// Meter
// ---------------------------------------------------------------------------

/// Turns captures into noise levels, falling back to a fixed quiet-room
/// level when the microphone is unavailable.
pub struct NoiseMeter<C: AudioCapture> {
    capture: C,
    calibration_offset: f64,
    fallback_db: f64,
    sample_rate: u32,
    capture_secs: f64,
}

impl<C: AudioCapture> NoiseMeter<C> {
    pub fn new(capture: C, config: &NoiseConfig) -> Self {
        Self {
            capture,
            calibration_offset: config.calibration_offset,
            fallback_db: config.fallback_db,
            sample_rate: config.sample_rate,
            capture_secs: config.capture_secs,
        }
    }

    fn sample_count(&self) -> usize {
        (f64::from(self.sample_rate) * self.capture_secs) as usize
    }

    /// Measures the current noise level. Never fails.
    pub fn measure(&mut self) -> f64 {
        let count = self.sample_count();
        match self.capture.capture(count, self.sample_rate) {
            Ok(samples) if !samples.is_empty() => rms_to_db(rms(&samples), self.calibration_offset),
            Ok(_) => self.fall_back(&CaptureError::Empty),
            Err(e) => self.fall_back(&e),
        }
    }

    fn fall_back(&self, err: &CaptureError) -> f64 {
        logging::warn(
            Subsystem::Sensor,
            None,
            &format!("Noise measurement failed ({}); using {} dB", err, self.fallback_db),
        );
        self.fallback_db
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
