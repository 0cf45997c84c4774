use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use testdrive_relay::api::{ApiClient, ApiConfig, SessionFilter, SessionResolver};
use testdrive_relay::driver::{resolve_reader_session, ReaderLoop, Shutdown};
use testdrive_relay::source::device::{parse_address, DeviceSource};
use testdrive_shared::state_machine::{ExitStatus, LoopProfile, LoopStateMachine};
use testdrive_shared::{intervals, DEFAULT_API_URL, DEFAULT_RUUVITAG_MAC};
use tracing::{error, info};

/// Relay a physical RuuviTag's broadcasts to the test drive API
#[derive(Parser, Debug)]
#[command(name = "ruuvi-reader", version)]
struct Cli {
    /// Base URL of the test drive API
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// MAC address of the RuuviTag to listen to
    #[arg(long, env = "RUUVITAG_MAC", default_value = DEFAULT_RUUVITAG_MAC)]
    mac: String,

    /// Relay to this test drive instead of looking one up
    #[arg(long, env = "TEST_DRIVE_ID")]
    test_drive_id: Option<String>,

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
            error!("[LOOP] Unexpected error: {:#}", e);
            troubleshooting();
            ExitStatus::Fatal
        }
    };
    ExitCode::from(status.code())
}

async fn run(cli: Cli) -> Result<ExitStatus> {
    let target = parse_address(&cli.mac)?;

    info!("Real RuuviTag reader");
    info!("  API URL: {}", cli.api_url);
    info!("  RuuviTag MAC: {}", target);

    let client = ApiClient::new(&ApiConfig {
        base_url: cli.api_url,
        request_timeout: Duration::from_secs(cli.timeout_secs),
    })?;
    let mut shutdown = Shutdown::on_ctrl_c();
    let mut fsm = LoopStateMachine::new(LoopProfile::READER);

    // Session first: without one there is nothing to scan for
    let resolver = SessionResolver::new(client.clone(), SessionFilter::Hardware(target.to_string()));
    let explicit = cli.test_drive_id.as_deref();
    let test_drive_id =
        match resolve_reader_session(&resolver, explicit, &mut fsm, &mut shutdown).await {
            Ok(id) => id,
            Err(status) => return Ok(status),
        };

    let source = DeviceSource::open(target).await?;
    let mut reader = ReaderLoop::new(client, source, test_drive_id, fsm, shutdown);

    let status = reader.run().await;
    if status == ExitStatus::Fatal {
        troubleshooting();
    }
    Ok(status)
}

fn troubleshooting() {
    error!("Troubleshooting:");
    error!("  1. Make sure the RuuviTag is nearby and powered on");
    error!("  2. Verify Bluetooth is enabled and bluetoothd is running");
    error!("  3. Check the MAC address matches your RuuviTag");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Cli::try_parse_from(["ruuvi-reader", "--timeout-secs", "0"]).is_err());

        let cli = Cli::try_parse_from(["ruuvi-reader", "--timeout-secs", "3"]).unwrap();
        assert_eq!(cli.timeout_secs, 3);
    }
}
