//! envmon_service entrypoint
//!
//! ## Usage
//!
//! ```bash
//! envmon_service [--config PATH] [--dev] [serve|read|log [NAME]|leaderboard]
//! ```
//!
//! - `serve` (default) - Run the JSON API
//! - `read` - Print one instantaneous reading with scores
//! - `log [NAME]` - Run one aggregation window and persist it
//! - `leaderboard` - Print the newest scores per location
//!
//! `--dev` uses simulated sensors and an in-memory store.

use std::env;
use std::error::Error;
use std::sync::Arc;

use envmon_service::aggregate::AggregationConfig;
use envmon_service::api::App;
use envmon_service::config::{self, AppConfig};
use envmon_service::dev_mode;
use envmon_service::logging::{self, Subsystem};
use envmon_service::sensors::SensorLock;
use envmon_service::sensors::board::BoardSensors;
use envmon_service::server::Server;
use envmon_service::store::{LogStore, PgLogStore};

#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Read,
    Log(Option<String>),
    Leaderboard,
}

struct Args {
    config_path: String,
    dev: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config_path = env::var("ENVMON_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());
    let mut dev = false;
    let mut positional = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dev" => dev = true,
            "--config" => {
                config_path = iter.next().ok_or("--config requires a path")?.clone();
            }
            other if other.starts_with("--") => return Err(format!("unknown option '{}'", other)),
            other => positional.push(other.to_string()),
        }
    }

    let command = match positional.first().map(String::as_str) {
        None | Some("serve") => Command::Serve,
        Some("read") => Command::Read,
        Some("log") => Command::Log(positional.get(1).cloned()),
        Some("leaderboard") => Command::Leaderboard,
        Some(other) => return Err(format!("unknown command '{}'", other)),
    };

    Ok(Args {
        config_path,
        dev,
        command,
    })
}

fn build_app(config: &AppConfig, dev: bool) -> Result<App, Box<dyn Error>> {
    let aggregation = AggregationConfig::from_settings(&config.aggregation, &config.scoring);

    let (sensors, store): (SensorLock, Arc<dyn LogStore>) = if dev {
        logging::info(Subsystem::System, None, "Dev mode: simulated sensors, in-memory store");
        dev_mode::dev_components()
    } else {
        let url = config
            .database_url()
            .ok_or("DATABASE_URL is not set and [database] url is missing")?;
        let store: Arc<dyn LogStore> = Arc::new(PgLogStore::new(url));
        (
            SensorLock::new(BoardSensors::from_config(&config.sensors, &config.noise)),
            store,
        )
    };

    Ok(App::new(sensors, store, aggregation))
}

fn main() -> Result<(), Box<dyn Error>> {
    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            eprintln!("Usage: envmon_service [--config PATH] [--dev] [serve|read|log [NAME]|leaderboard]");
            return Err(msg.into());
        }
    };

    let config = config::load_config(&args.config_path)?;
    logging::init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let app = build_app(&config, args.dev)?;

    match args.command {
        Command::Serve => {
            let server = Server::bind(config.server.bind.as_str())?;
            server.serve(app)?;
        }
        Command::Read => {
            println!("{}", serde_json::to_string_pretty(&app.read_now())?);
        }
        Command::Log(name) => {
            // Mirrors the API, but a missing name means the default location.
            let name = name.unwrap_or_else(|| config.aggregation.default_location.clone());
            let outcome = app.log_now(Some(name.as_str()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "location": outcome.summary.location,
                    "timestamp_utc": outcome.summary.timestamp_utc,
                    "samples": outcome.summary.sample_count,
                    "readings": outcome.summary.reading,
                    "scores": outcome.summary.scores,
                }))?
            );
        }
        Command::Leaderboard => {
            println!("{}", serde_json::to_string_pretty(&app.leaderboard())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("envmon_service")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(args.command, Command::Serve);
        assert!(!args.dev);
    }

    #[test]
    fn test_log_with_name_and_flags() {
        let args = parse_args(&argv(&["--dev", "log", "Library", "--config", "/etc/envmon.toml"])).unwrap();
        assert_eq!(args.command, Command::Log(Some("Library".to_string())));
        assert!(args.dev);
        assert_eq!(args.config_path, "/etc/envmon.toml");
    }

    #[test]
    fn test_unknown_command_and_option_are_rejected() {
        assert!(parse_args(&argv(&["frobnicate"])).is_err());
        assert!(parse_args(&argv(&["--verbose"])).is_err());
        assert!(parse_args(&argv(&["--config"])).is_err());
    }
}
