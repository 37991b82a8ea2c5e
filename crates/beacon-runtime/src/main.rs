use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use beacon_runtime::{ServiceRuntime, config, logging};

/// Bus event-monitor service.
///
/// Watches the availability of bus services, drives plugin lifecycle from
/// it, and raises notifications on the plugins' behalf.
#[derive(Parser)]
#[command(name = "beacon", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from_file(path),
        None => config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("beacon: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_from_config(&config.logging);

    let runtime = match ServiceRuntime::new(config) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "Failed to initialise");
            return ExitCode::FAILURE;
        }
    };

    match runtime.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Service failed");
            ExitCode::FAILURE
        }
    }
}
