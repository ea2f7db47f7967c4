//! Hazard Monitoring Service - Main Daemon
//!
//! A server-side daemon that continuously:
//! 1. Pulls weather warnings, nowcast, river stages and advisories
//! 2. Scores the composite disaster risk (0-100)
//! 3. Evaluates rainfall, water-level and wind alerts against user settings
//! 4. Dispatches deduplicated alerts to the configured channel
//! 5. Optionally serves the results over HTTP
//!
//! Usage:
//!   hazmon                              # Start daemon with hazmon.toml
//!   hazmon --config /etc/hazmon.toml    # Use another configuration file
//!   hazmon --endpoint 8080              # Also serve HTTP on port 8080
//!   hazmon --once                       # Run one tick, print JSON, exit
//!
//! Environment:
//!   HAZMON_CONFIG        - configuration file path
//!   HAZMON_CHANNEL_TOKEN - bearer token for the pubsub channel
//!   RUST_LOG             - log filter (default: info)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use hazmon_service::config::{load_config, DEFAULT_CONFIG_PATH};
use hazmon_service::daemon::Daemon;
use hazmon_service::endpoint::{self, Endpoint};

#[derive(Parser)]
#[command(name = "hazmon")]
#[command(version, about = "Disaster-risk scoring and hazard notification daemon")]
struct Cli {
    /// Service configuration file
    #[arg(short, long, env = "HAZMON_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serve the HTTP endpoint on this port
    #[arg(long, value_name = "PORT")]
    endpoint: Option<u16>,

    /// Run a single tick, print the JSON report and exit
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let daemon = match Daemon::from_config(&config) {
        Ok(daemon) => daemon,
        Err(e) => {
            log::error!("❌ Initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        let report = daemon.tick();
        return match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("failed to encode tick report: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Some(port) = cli.endpoint {
        let endpoint = Endpoint::for_daemon(&daemon);
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, endpoint) {
                log::error!("❌ Endpoint server error: {}", e);
            }
        });
    }

    daemon.run();
    ExitCode::SUCCESS
}
