/// Integration tests for the HTTP API
///
/// Tests verify:
/// 1. Request validation on the log endpoint
/// 2. Logged windows show up on the leaderboard
/// 3. Instantaneous reads wait for an in-progress aggregation window
///
/// Each test binds its own server on an ephemeral loopback port with a
/// fixed sensor source and an in-memory store; no hardware or database
/// is needed.
///
/// Run with: cargo test --test api_integration

use envmon_service::aggregate::AggregationConfig;
use envmon_service::api::App;
use envmon_service::sensors::{SensorLock, SensorSource};
use envmon_service::server::Server;
use envmon_service::store::{LogStore, MemoryLogStore};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct OfficeSensors {
    samples: Arc<AtomicUsize>,
}

impl SensorSource for OfficeSensors {
    fn temperature_c(&mut self) -> f64 {
        self.samples.fetch_add(1, Ordering::SeqCst);
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

struct TestServer {
    base_url: String,
    store: Arc<MemoryLogStore>,
    samples: Arc<AtomicUsize>,
}

fn start_server(window: Duration) -> TestServer {
    let samples = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(MemoryLogStore::new());
    let config = AggregationConfig {
        window,
        sample_interval: Duration::from_millis(250),
        ..AggregationConfig::default()
    };
    let store_dyn: Arc<dyn LogStore> = store.clone();
    let app = App::new(
        SensorLock::new(OfficeSensors { samples: Arc::clone(&samples) }),
        store_dyn,
        config,
    );

    let server = Server::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = server.local_addr().expect("bound address");
    thread::spawn(move || server.serve(app));

    TestServer {
        base_url: format!("http://{}", addr),
        store,
        samples,
    }
}

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// 1. Validation
// ---------------------------------------------------------------------------

#[test]
fn test_log_without_name_is_rejected_before_sampling() {
    let server = start_server(Duration::from_secs(1));
    let client = http_client();

    for body in [json!({}), json!({"name": ""}), json!({"name": null}), json!({"name": 7})] {
        let response = client
            .post(format!("{}/api/log", server.base_url))
            .json(&body)
            .send()
            .expect("request should complete");
        assert_eq!(response.status().as_u16(), 400, "body {} should be rejected", body);

        let json: Value = response.json().unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Missing or invalid 'name'");
    }

    assert_eq!(server.samples.load(Ordering::SeqCst), 0, "sensors must not be touched");
    assert!(server.store.records().is_empty(), "store must not be touched");
}

#[test]
fn test_non_json_body_is_rejected() {
    let server = start_server(Duration::from_secs(1));
    let response = http_client()
        .post(format!("{}/api/log", server.base_url))
        .body("name=Lab")
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

// ---------------------------------------------------------------------------
// 2. Logging and leaderboard
// ---------------------------------------------------------------------------

#[test]
fn test_logged_window_appears_on_leaderboard() {
    let server = start_server(Duration::from_secs(1));
    let client = http_client();

    let empty: Value = client
        .get(format!("{}/leaderboard", server.base_url))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(empty, json!([]));

    let response = client
        .post(format!("{}/api/log", server.base_url))
        .json(&json!({"name": "Lab"}))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let json: Value = response.json().unwrap();
    assert_eq!(json, json!({"status": "success", "message": "Reading logged.", "name": "Lab"}));

    let records = server.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].location, "Lab");
    assert_eq!(records[0].reading.temperature_f, 68.0);

    let board: Value = client
        .get(format!("{}/leaderboard", server.base_url))
        .send()
        .unwrap()
        .json()
        .unwrap();
    let entries = board.as_array().expect("leaderboard is an array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["location"], "Lab");
    assert_eq!(entries[0]["total_score"], 98);
    assert!(entries[0].get("temperature_f").is_none(), "only score fields are listed");
}

#[test]
fn test_whitespace_name_is_logged_under_default_location() {
    let server = start_server(Duration::from_millis(100));
    let response = http_client()
        .post(format!("{}/api/log", server.base_url))
        .json(&json!({"name": "   "}))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(server.store.records()[0].location, "Bedroom");
}

#[test]
fn test_sensors_endpoint_returns_readings_and_scores() {
    let server = start_server(Duration::from_secs(1));
    let json: Value = http_client()
        .get(format!("{}/sensors", server.base_url))
        .send()
        .unwrap()
        .json()
        .unwrap();

    assert_eq!(json["readings"]["temperature_c"], 20.0);
    assert_eq!(json["readings"]["humidity_pct"], 50.0);
    assert_eq!(json["scores"]["temperature_score"], 99);
    assert_eq!(json["scores"]["light_score"], 96);
    assert_eq!(json["scores"]["humidity_score"], 99);
    assert_eq!(json["scores"]["noise_score"], 97);
    assert_eq!(json["scores"]["total_score"], 98);
    assert!(server.store.records().is_empty(), "read-now never persists");
}

#[test]
fn test_unknown_route_is_404() {
    let server = start_server(Duration::from_secs(1));
    let response = http_client()
        .get(format!("{}/metrics", server.base_url))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

// ---------------------------------------------------------------------------
// 3. Sensor exclusivity
// ---------------------------------------------------------------------------

#[test]
fn test_read_now_waits_for_running_window() {
    let window = Duration::from_millis(1500);
    let server = start_server(window);
    let base_url = server.base_url.clone();

    let started = Instant::now();
    let logger = thread::spawn(move || {
        http_client()
            .post(format!("{}/api/log", base_url))
            .json(&json!({"name": "Lab"}))
            .send()
            .unwrap()
            .status()
            .as_u16()
    });

    // Let the window start before asking for an instantaneous reading.
    thread::sleep(Duration::from_millis(300));
    let response = http_client()
        .get(format!("{}/sensors", server.base_url))
        .send()
        .unwrap();
    let read_finished = started.elapsed();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(logger.join().unwrap(), 200);
    assert!(
        read_finished >= window,
        "read-now finished after {:?}, before the {:?} window completed",
        read_finished,
        window
    );
}
