//! Environmental productivity monitor.
//!
//! Reads temperature, humidity, light and noise on a single-board computer,
//! converts them into 0–100 productivity scores, averages short sampling
//! windows into persisted per-location records, and serves the results
//! (read now, log now, leaderboard) over a small JSON API.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod dev_mode;
pub mod logging;
pub mod model;
pub mod scoring;
pub mod sensors;
pub mod server;
pub mod store;
