use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use testdrive_relay::api::{ApiClient, ApiConfig, SessionFilter, SessionResolver};
use testdrive_relay::driver::{Shutdown, SimulatorLoop};
use testdrive_relay::source::{SimulatedSource, DEFAULT_ORIGIN};
use testdrive_shared::state_machine::{ExitStatus, LoopProfile, LoopStateMachine};
use testdrive_shared::{intervals, Coordinate, DEFAULT_API_URL};
use tracing::{error, info};

/// Feed simulated RuuviTag data to every active test drive
#[derive(Parser, Debug)]
#[command(name = "ruuvi-simulator", version)]
struct Cli {
    /// Base URL of the test drive API
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Latitude the simulated vehicles drift around
    #[arg(long, default_value_t = DEFAULT_ORIGIN.latitude, allow_negative_numbers = true)]
    origin_lat: f64,

    /// Longitude the simulated vehicles drift around
    #[arg(long, default_value_t = DEFAULT_ORIGIN.longitude, allow_negative_numbers = true)]
    origin_lon: f64,

    /// Seed for reproducible readings
    #[arg(long)]
    seed: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        default_value_t = intervals::REQUEST_TIMEOUT_MS / 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    testdrive_relay::init_tracing();
    let cli = Cli::parse();

    let status = match run(cli).await {
        Ok(status) => status,
        Err(e) => {
            error!("[SIM] Unexpected error: {:#}", e);
            ExitStatus::Fatal
        }
    };
    ExitCode::from(status.code())
}

async fn run(cli: Cli) -> Result<ExitStatus> {
    info!("RuuviTag data simulator");
    info!("  API endpoint: {}", cli.api_url);

    let client = ApiClient::new(&ApiConfig {
        base_url: cli.api_url,
        request_timeout: Duration::from_secs(cli.timeout_secs),
    })?;
    let resolver = SessionResolver::new(client.clone(), SessionFilter::All);

    let origin = Coordinate::new(cli.origin_lat, cli.origin_lon);
    let source = match cli.seed {
        Some(seed) => SimulatedSource::seeded(origin, seed),
        None => SimulatedSource::new(origin),
    };

    let mut simulator = SimulatorLoop::new(
        client,
        resolver,
        source,
        LoopStateMachine::new(LoopProfile::SIMULATOR),
        Shutdown::on_ctrl_c(),
    );
    Ok(simulator.run().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_and_timeout_bound() {
        let cli = Cli::try_parse_from(["ruuvi-simulator"]).unwrap();
        assert_eq!(cli.timeout_secs, 10);
        assert_eq!(cli.origin_lat, DEFAULT_ORIGIN.latitude);
        assert_eq!(cli.origin_lon, DEFAULT_ORIGIN.longitude);

        assert!(Cli::try_parse_from(["ruuvi-simulator", "--timeout-secs", "0"]).is_err());
    }
}
