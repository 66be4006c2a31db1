/// The service's operations and their HTTP routes.
///
/// `App` owns the shared sensor lock, the store and the aggregation
/// settings, and exposes the three operations (read now, log now,
/// leaderboard). `route` maps a parsed request onto them and renders JSON;
/// it knows nothing about sockets, which live in `server`.

use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::aggregate::{self, AggregationConfig, Clock, SystemClock, WindowSummary};
use crate::logging::{self, Subsystem};
use crate::model::{LeaderboardEntry, LogNowError, Reading, ScoreSet};
use crate::scoring;
use crate::sensors::SensorLock;
use crate::store::LogStore;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadNow {
    pub readings: Reading,
    pub scores: ScoreSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogOutcome {
    /// The name as the caller sent it.
    pub name: String,
    pub summary: WindowSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "status": "error", "message": message }),
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct App {
    sensors: SensorLock,
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
    config: AggregationConfig,
}

impl App {
    pub fn new(sensors: SensorLock, store: Arc<dyn LogStore>, config: AggregationConfig) -> Self {
        Self::with_clock(sensors, store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        sensors: SensorLock,
        store: Arc<dyn LogStore>,
        clock: Arc<dyn Clock>,
        config: AggregationConfig,
    ) -> Self {
        Self {
            sensors,
            store,
            clock,
            config,
        }
    }

    /// One instantaneous reading and its scores. Nothing is persisted.
    ///
    /// Waits for any in-progress aggregation window to finish.
    pub fn read_now(&self) -> ReadNow {
        let readings = {
            let mut guard = self.sensors.acquire();
            guard.reading()
        };
        ReadNow {
            scores: scoring::calculate_scores_with(&readings, self.config.optimal_lux),
            readings,
        }
    }

    /// Runs one aggregation window for `name` and persists the result.
    ///
    /// The name must be a non-empty string; it is checked before the
    /// sensors or the store are touched. A whitespace-only name is accepted
    /// and logged under the default location.
    pub fn log_now(&self, name: Option<&str>) -> Result<LogOutcome, LogNowError> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(LogNowError::InvalidName),
        };

        let summary = aggregate::log_now(
            &self.sensors,
            self.store.as_ref(),
            self.clock.as_ref(),
            &self.config,
            Some(name),
        )?;

        logging::info(Subsystem::Api, Some(&summary.location), "Reading logged");
        Ok(LogOutcome {
            name: name.to_string(),
            summary,
        })
    }

    /// Newest scores per location, best first. Never fails: an unavailable
    /// or unprovisioned store yields an empty leaderboard.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let result = self
            .store
            .ensure_schema()
            .and_then(|_| self.store.latest_per_location());
        match result {
            Ok(entries) => entries,
            Err(e) => {
                logging::log_store_failure(None, "leaderboard", &e);
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Extracts the `name` field from a log request body.
///
/// Anything other than a JSON object with a string `name` yields `None`,
/// which `log_now` rejects.
pub fn name_from_body(body: &[u8]) -> Option<String> {
    let parsed: Value = serde_json::from_slice(body).unwrap_or_else(|_| json!({}));
    parsed.get("name").and_then(Value::as_str).map(String::from)
}

pub fn route(app: &App, method: &str, path: &str, body: &[u8]) -> ApiResponse {
    let path = path.split('?').next().unwrap_or(path);

    match (method, path) {
        ("GET", "/") => ApiResponse::ok(json!({
            "service": "envmon_service",
            "routes": ["GET /sensors", "POST /api/log", "GET /leaderboard"],
        })),
        ("GET", "/sensors") => match serde_json::to_value(app.read_now()) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::error(500, &e.to_string()),
        },
        ("POST", "/api/log") => {
            let name = name_from_body(body);
            match app.log_now(name.as_deref()) {
                Ok(outcome) => ApiResponse::ok(json!({
                    "status": "success",
                    "message": "Reading logged.",
                    "name": outcome.name,
                })),
                Err(LogNowError::InvalidName) => {
                    ApiResponse::error(400, &LogNowError::InvalidName.to_string())
                }
                Err(e) => {
                    logging::error(Subsystem::Api, name.as_deref(), &format!("Log request failed: {}", e));
                    ApiResponse::error(500, &e.to_string())
                }
            }
        }
        ("GET", "/leaderboard") => match serde_json::to_value(app.leaderboard()) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::error(500, &e.to_string()),
        },
        (_, "/" | "/sensors" | "/api/log" | "/leaderboard") => {
            ApiResponse::error(405, "Method not allowed")
        }
        _ => ApiResponse::error(404, "Not found"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
