//! Loop drivers
//!
//! This module handles:
//! - Pulling readings from a source, normalizing and relaying them
//! - Feeding every outcome to the `LoopStateMachine`, which decides the wait
//! - Cooperative shutdown on Ctrl+C

mod reader;
pub mod shutdown;
mod simulator;

pub use reader::{resolve_reader_session, ReaderLoop};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use simulator::SimulatorLoop;

use crate::api::ApiError;
use std::ops::ControlFlow;
use std::time::Duration;
use testdrive_shared::state_machine::{
    ExitStatus, LoopEvent, LoopState, LoopStateMachine, TransitionResult,
};
use testdrive_shared::{RawReading, Session};
use tracing::{info, warn};

/// Feed one event to the machine.
///
/// `Continue` carries how long to wait before the next step.
fn advance(fsm: &mut LoopStateMachine, event: LoopEvent) -> ControlFlow<ExitStatus, Duration> {
    match fsm.process_event(event) {
        TransitionResult::Continue { after } => ControlFlow::Continue(after),
        TransitionResult::Stop(status) => ControlFlow::Break(status),
        TransitionResult::Invalid { event } => {
            warn!("[LOOP] Ignoring {:?} after stop", event);
            match fsm.state() {
                LoopState::Stopped(status) => ControlFlow::Break(status),
                LoopState::Running => ControlFlow::Break(ExitStatus::Fatal),
            }
        }
    }
}

/// Feed an event that always stops the loop and return the exit status
fn terminate(fsm: &mut LoopStateMachine, event: LoopEvent) -> ExitStatus {
    match advance(fsm, event) {
        ControlFlow::Break(status) => status,
        ControlFlow::Continue(_) => ExitStatus::Fatal,
    }
}

/// Sleep for `after` unless shutdown fires first
async fn pause(
    fsm: &mut LoopStateMachine,
    shutdown: &mut Shutdown,
    after: Duration,
) -> ControlFlow<ExitStatus> {
    if after.is_zero() {
        return ControlFlow::Continue(());
    }
    tokio::select! {
        biased;
        _ = shutdown.wait() => ControlFlow::Break(terminate(fsm, LoopEvent::Interrupted)),
        _ = tokio::time::sleep(after) => ControlFlow::Continue(()),
    }
}

/// Log the outcome of one POST; failures are fed to the machine
fn report(
    fsm: &mut LoopStateMachine,
    endpoint: &'static str,
    result: Result<(), ApiError>,
) -> ControlFlow<ExitStatus, Duration> {
    match result {
        Ok(()) => {
            info!("[RELAY] {} accepted", endpoint);
            ControlFlow::Continue(Duration::ZERO)
        }
        Err(e) => {
            warn!("[RELAY] {} failed: {}", endpoint, e);
            advance(
                fsm,
                LoopEvent::RelayFailed {
                    endpoint,
                    reason: e.to_string(),
                },
            )
        }
    }
}

fn show(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v}{unit}"),
        None => "n/a".into(),
    }
}

fn log_reading(origin: &str, reading: &RawReading) {
    let [x, y, z] = reading.acceleration();
    info!(
        "[SCAN] {}: temperature {}, humidity {}, pressure {}, acceleration {}/{}/{}",
        origin,
        show(reading.temperature(), " °C"),
        show(reading.humidity(), " %"),
        show(reading.pressure(), " hPa"),
        show(x, " g"),
        show(y, " g"),
        show(z, " g"),
    );
}

fn log_banner(session: &Session) {
    info!("[RESOLVER] Test drive {}", session.id);
    info!("[RESOLVER]   Vehicle: {}", session.vehicle.describe());
    info!("[RESOLVER]   Customer: {}", session.customer_name());
}


#[cfg(test)]
mod tests {
    use super::*;
    use testdrive_shared::state_machine::LoopProfile;

    #[test]
    fn test_advance_maps_transitions() {
        let mut fsm = LoopStateMachine::new(LoopProfile::READER);
        assert_eq!(
            advance(&mut fsm, LoopEvent::TickCompleted),
            ControlFlow::Continue(Duration::from_secs(2))
        );
        assert_eq!(
            terminate(&mut fsm, LoopEvent::Interrupted),
            ExitStatus::Clean
        );
        // Later events keep reporting the first stop
        assert_eq!(
            advance(&mut fsm, LoopEvent::NoActiveSessions),
            ControlFlow::Break(ExitStatus::Clean)
        );
    }

    #[tokio::test]
    async fn test_pause_interrupted() {
        let mut fsm = LoopStateMachine::new(LoopProfile::SIMULATOR);
        let (trigger, mut shutdown) = shutdown::channel();
        trigger.trigger();

        let flow = pause(&mut fsm, &mut shutdown, Duration::from_secs(60)).await;
        assert_eq!(flow, ControlFlow::Break(ExitStatus::Clean));
        assert_eq!(fsm.state(), LoopState::Stopped(ExitStatus::Clean));
    }

    #[test]
    fn test_report_failure_continues() {
        let mut fsm = LoopStateMachine::new(LoopProfile::READER);
        let flow = report(
            &mut fsm,
            "/api/ruuvitag/sensor",
            Err(ApiError::Timeout(Duration::from_secs(10))),
        );
        assert_eq!(flow, ControlFlow::Continue(Duration::ZERO));
        assert_eq!(fsm.relay_failures(), 1);
    }

    #[test]
    fn test_show_missing_value() {
        assert_eq!(show(Some(21.5), " °C"), "21.5 °C");
        assert_eq!(show(None, " °C"), "n/a");
    }
}
