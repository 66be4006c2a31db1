/// Productivity scoring for environmental readings.
///
/// Each factor is mapped onto a roughly 0–100 scale where 100 is the
/// empirically optimal condition for occupant task performance. The
/// functions here are pure: no state, no I/O, no clock.
///
/// Sources for the fitted curves:
/// - Temperature: LBNL, "Effect of temperature on task performance in office
///   environment" (cubic fit of relative performance vs. °C).
/// - Light: log response to illuminance, normalised at 500 lux.
/// - Humidity: quadratic comfort penalty centred at 45% RH (tuned so 30% and
///   60% give ~95).
/// - Noise: Srinivasan et al. (2023), npj Digital Medicine. Wellbeing peaks at
///   50 dBA, +5.4% per 10 dB below and -1.9% per 10 dB above.
///
/// The coefficients are reproduced exactly and must not be re-tuned here.

use crate::model::{Reading, Score, ScoreSet};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Illuminance that maps to a light score of ~100.
pub const DEFAULT_OPTIMAL_LUX: f64 = 500.0;

/// Relative humidity with no comfort penalty.
pub const HUMIDITY_OPTIMUM_PCT: f64 = 45.0;

/// Sound level at which the noise score peaks.
pub const NOISE_PIVOT_DB: f64 = 50.0;

const HUMIDITY_PENALTY_K: f64 = 0.000222;
const NOISE_CLAMP_MAX_DB: f64 = 120.0;
const COMPONENT_WEIGHT: f64 = 0.25;

// ---------------------------------------------------------------------------
// Component scores
// ---------------------------------------------------------------------------

/// Cubic fit of task performance against temperature in °C.
///
/// Unclamped: extreme inputs fall outside 0–100 (0 °C scores about -47).
pub fn temperature_score(temperature_c: f64) -> f64 {
    let t = temperature_c;
    100.0 * (0.0000623 * t.powi(3) - 0.0058274 * t.powi(2) + 0.1647524 * t - 0.4685328)
}

/// Logarithmic light score, 0 at 0 lux and ~100 at `optimal` lux.
///
/// Lux at or below -1 (or NaN) leaves the logarithm's domain and yields a
/// non-finite result, as does an `optimal` of 1 or less.
pub fn light_score(lux: f64, optimal: f64) -> f64 {
    100.0 * (lux + 1.0).ln() / optimal.ln()
}

/// Quadratic comfort penalty around 45% relative humidity.
pub fn humidity_score(humidity_pct: f64) -> f64 {
    let rh = humidity_pct.clamp(0.0, 100.0);
    100.0 * (1.0 - HUMIDITY_PENALTY_K * (rh - HUMIDITY_OPTIMUM_PCT).powi(2))
}

/// Piecewise-linear noise score pivoting at 50 dB.
///
/// Both branches give exactly 100 at the pivot.
pub fn noise_score(db: f64) -> f64 {
    let db = db.clamp(0.0, NOISE_CLAMP_MAX_DB);
    if db <= NOISE_PIVOT_DB {
        100.0 - 5.4 * ((NOISE_PIVOT_DB - db) / 10.0)
    } else {
        100.0 - 1.9 * ((db - NOISE_PIVOT_DB) / 10.0)
    }
}

/// Equal-weighted mean of the four component scores.
pub fn total_score(temperature: f64, light: f64, humidity: f64, noise: f64) -> f64 {
    temperature * COMPONENT_WEIGHT
        + light * COMPONENT_WEIGHT
        + humidity * COMPONENT_WEIGHT
        + noise * COMPONENT_WEIGHT
}

// ---------------------------------------------------------------------------
// Reading → ScoreSet
// ---------------------------------------------------------------------------

/// Scores a reading with the default optimal illuminance.
pub fn calculate_scores(reading: &Reading) -> ScoreSet {
    calculate_scores_with(reading, DEFAULT_OPTIMAL_LUX)
}

/// Scores a reading and rounds every field independently.
///
/// A field whose raw value is not a finite number becomes
/// `Score::Unavailable`; the other fields are still reported.
pub fn calculate_scores_with(reading: &Reading, optimal_lux: f64) -> ScoreSet {
    let temperature = temperature_score(reading.temperature_c);
    let light = light_score(reading.light_lux, optimal_lux);
    let humidity = humidity_score(reading.humidity_pct);
    let noise = noise_score(reading.noise_db);
    let total = total_score(temperature, light, humidity, noise);

    ScoreSet {
        temperature_score: Score::from_raw(temperature),
        light_score: Score::from_raw(light),
        humidity_score: Score::from_raw(humidity),
        noise_score: Score::from_raw(noise),
        total_score: Score::from_raw(total),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
