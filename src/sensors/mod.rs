/// Sensor access for the monitoring service.
///
/// The rest of the crate sees the hardware only through [`SensorSource`],
/// so the scoring and aggregation code can run against a deterministic fake.
/// All access goes through a [`SensorLock`]: the environmental sensors and
/// the microphone share one bus, and a multi-second aggregation window must
/// not interleave with an instantaneous read.
///
/// Submodules:
/// - `noise` — RMS → dB conversion and the audio capture seam.
/// - `board` — sysfs/IIO-backed sensors for a Linux single-board computer.

pub mod board;
pub mod noise;

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::logging::{self, Subsystem};
use crate::model::Reading;

// ---------------------------------------------------------------------------
// Capability interface
// ---------------------------------------------------------------------------

/// Instantaneous environmental readings.
///
/// Implementations recover from transient hardware failures themselves
/// (last good value, documented fallback constant) rather than propagating.
pub trait SensorSource: Send {
    /// Air temperature in °C, already compensated for board heat.
    fn temperature_c(&mut self) -> f64;

    /// Relative humidity in percent.
    fn humidity_pct(&mut self) -> f64;

    /// Illuminance in lux.
    fn light_lux(&mut self) -> f64;

    /// Ambient noise level in dB.
    fn noise_db(&mut self) -> f64;

    /// Samples every sensor once.
    ///
    /// Fahrenheit is derived from the same Celsius sample so the two
    /// temperature fields always agree.
    fn reading(&mut self) -> Reading {
        let temperature_c = self.temperature_c();
        Reading {
            temperature_c,
            temperature_f: celsius_to_fahrenheit(temperature_c),
            humidity_pct: self.humidity_pct(),
            light_lux: self.light_lux(),
            noise_db: self.noise_db(),
        }
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Corrects an enclosure temperature for heat radiated by the CPU.
///
/// `factor` is tuned against a reference thermometer; larger values apply
/// less correction.
pub fn compensate_temperature(raw_c: f64, cpu_c: f64, factor: f64) -> f64 {
    raw_c - (cpu_c - raw_c) / factor
}

// ---------------------------------------------------------------------------
// Exclusive access
// ---------------------------------------------------------------------------

type SharedSource = Arc<Mutex<Box<dyn SensorSource>>>;

/// Owner of the single sensor source; hands out one guard at a time.
///
/// Cloning shares the same underlying source and lock.
#[derive(Clone)]
pub struct SensorLock {
    inner: SharedSource,
}

impl SensorLock {
    pub fn new<S: SensorSource + 'static>(source: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(source))),
        }
    }

    /// Blocks until no other operation holds the sensors.
    ///
    /// The returned guard releases the sensors when dropped, on every exit
    /// path. A lock poisoned by a panicking holder is recovered: sensors
    /// carry no cross-call invariants a panic could break.
    pub fn acquire(&self) -> SensorGuard<'_> {
        let guard = self.inner.lock().unwrap_or_else(|poisoned| {
            logging::warn(
                Subsystem::Sensor,
                None,
                "Sensor lock was poisoned by a failed operation; recovering",
            );
            poisoned.into_inner()
        });
        SensorGuard { guard }
    }
}

/// Exclusive, scoped access to the sensor source.
pub struct SensorGuard<'a> {
    guard: MutexGuard<'a, Box<dyn SensorSource>>,
}

impl Deref for SensorGuard<'_> {
    type Target = dyn SensorSource;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl DerefMut for SensorGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    struct FixedSensors;

    impl SensorSource for FixedSensors {
        fn temperature_c(&mut self) -> f64 {
            20.0
        }
        fn humidity_pct(&mut self) -> f64 {
            50.0
        }
        fn light_lux(&mut self) -> f64 {
            400.0
        }
        fn noise_db(&mut self) -> f64 {
            45.0
        }
    }

    #[test]
    fn test_reading_derives_fahrenheit_from_celsius_sample() {
        let reading = FixedSensors.reading();
        assert_eq!(reading.temperature_c, 20.0);
        assert_eq!(reading.temperature_f, 68.0);
        assert_eq!(reading.humidity_pct, 50.0);
        assert_eq!(reading.light_lux, 400.0);
        assert_eq!(reading.noise_db, 45.0);
    }

    #[test]
    fn test_cpu_heat_compensation() {
        // 25 °C raw with the CPU at 45 °C and the default factor of 1.5.
        let comp = compensate_temperature(25.0, 45.0, 1.5);
        assert!((comp - 11.666_666_666_666_666).abs() < 1e-9);
    }

    #[test]
    fn test_no_compensation_when_cpu_matches_enclosure() {
        assert_eq!(compensate_temperature(21.0, 21.0, 1.5), 21.0);
    }

    #[test]
    fn test_guard_reads_through_to_source() {
        let lock = SensorLock::new(FixedSensors);
        let mut guard = lock.acquire();
        assert_eq!(guard.reading().light_lux, 400.0);
    }

    #[test]
    fn test_second_acquire_waits_for_release() {
        let lock = SensorLock::new(FixedSensors);
        let events = Arc::new(Mutex::new(Vec::new()));

        let holder = {
            let lock = lock.clone();
            let events = Arc::clone(&events);
            thread::spawn(move || {
                let _guard = lock.acquire();
                events.lock().unwrap().push("window start");
                thread::sleep(Duration::from_millis(150));
                events.lock().unwrap().push("window end");
            })
        };

        // Give the holder time to take the lock before contending for it.
        thread::sleep(Duration::from_millis(50));
        {
            let mut guard = lock.acquire();
            let _ = guard.reading();
            events.lock().unwrap().push("read now");
        }
        holder.join().unwrap();

        let events = events.lock().unwrap();
        assert_eq!(*events, vec!["window start", "window end", "read now"]);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = SensorLock::new(FixedSensors);
        let poisoner = lock.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.acquire();
            panic!("sensor driver crashed");
        })
        .join();

        let mut guard = lock.acquire();
        assert_eq!(guard.humidity_pct(), 50.0);
    }
}
