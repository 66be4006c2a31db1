/// Development mode utilities for running without sensor hardware
///
/// When the service is started with `--dev`, readings come from a
/// deterministic simulated room instead of the board, and records go to an
/// in-memory store instead of PostgreSQL. The API behaves exactly as in
/// production, which makes it usable for front-end work on a laptop.

use std::f64::consts::TAU;
use std::sync::Arc;

use crate::model::Reading;
use crate::sensors::{SensorLock, SensorSource, celsius_to_fahrenheit};
use crate::store::{LogStore, MemoryLogStore};

/// Samples per simulated cycle: one slow drift through the profile.
pub const CYCLE_SAMPLES: u64 = 120;

/// Baseline conditions the simulation drifts around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomProfile {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub light_lux: f64,
    pub noise_db: f64,
}

impl RoomProfile {
    /// A comfortable office in the afternoon.
    pub const fn office() -> Self {
        Self {
            temperature_c: 22.0,
            humidity_pct: 45.0,
            light_lux: 450.0,
            noise_db: 48.0,
        }
    }
}

/// A room whose conditions move smoothly and repeat every
/// `CYCLE_SAMPLES` readings.
pub struct SimulatedSensors {
    profile: RoomProfile,
    step: u64,
}

impl SimulatedSensors {
    pub fn new(profile: RoomProfile) -> Self {
        Self { profile, step: 0 }
    }

    fn phase(&self) -> f64 {
        (self.step % CYCLE_SAMPLES) as f64 / CYCLE_SAMPLES as f64 * TAU
    }
}

impl SensorSource for SimulatedSensors {
    fn temperature_c(&mut self) -> f64 {
        self.profile.temperature_c + 1.5 * self.phase().sin()
    }

    fn humidity_pct(&mut self) -> f64 {
        (self.profile.humidity_pct + 8.0 * self.phase().cos()).clamp(0.0, 100.0)
    }

    fn light_lux(&mut self) -> f64 {
        (self.profile.light_lux + 150.0 * self.phase().sin()).max(0.0)
    }

    fn noise_db(&mut self) -> f64 {
        self.profile.noise_db + 6.0 * (2.0 * self.phase()).sin()
    }

    /// Every field comes from the same step; the step advances afterwards.
    fn reading(&mut self) -> Reading {
        let temperature_c = self.temperature_c();
        let reading = Reading {
            temperature_c,
            temperature_f: celsius_to_fahrenheit(temperature_c),
            humidity_pct: self.humidity_pct(),
            light_lux: self.light_lux(),
            noise_db: self.noise_db(),
        };
        self.step += 1;
        reading
    }
}

/// Sensor lock and store for a hardware-free, database-free run.
pub fn dev_components() -> (SensorLock, Arc<dyn LogStore>) {
    (
        SensorLock::new(SimulatedSensors::new(RoomProfile::office())),
        Arc::new(MemoryLogStore::new()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring;

    #[test]
    fn test_first_sample_is_the_baseline() {
        let mut sim = SimulatedSensors::new(RoomProfile::office());
        let r = sim.reading();
        assert_eq!(r.temperature_c, 22.0);
        assert_eq!(r.humidity_pct, 53.0);
        assert_eq!(r.light_lux, 450.0);
        assert_eq!(r.noise_db, 48.0);
        assert!((r.temperature_f - 71.6).abs() < 1e-9);
    }

    #[test]
    fn test_simulation_repeats_each_cycle() {
        let mut a = SimulatedSensors::new(RoomProfile::office());
        let first = a.reading();
        for _ in 1..CYCLE_SAMPLES {
            a.reading();
        }
        assert_eq!(a.reading(), first);
    }

    #[test]
    fn test_simulated_readings_stay_scoreable() {
        let mut sim = SimulatedSensors::new(RoomProfile::office());
        for _ in 0..CYCLE_SAMPLES {
            let scores = scoring::calculate_scores(&sim.reading());
            let total = scores.total_score.value().expect("simulated totals are finite");
            assert!((80..=105).contains(&total), "total {} out of expected band", total);
        }
    }
}
