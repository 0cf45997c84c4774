//! Real-sensor loop: one test drive, one reading per broadcast

use super::{advance, log_banner, log_reading, pause, report, terminate, Shutdown};
use crate::api::{ApiClient, Resolution, SessionFilter, SessionResolver};
use crate::source::ReadingSource;
use std::ops::ControlFlow;
use std::time::Duration;
use testdrive_shared::state_machine::{ExitStatus, LoopEvent, LoopStateMachine};
use testdrive_shared::{normalize, SENSOR_PATH};
use tracing::{error, info, warn};

/// Work out the single test drive the reader relays to.
///
/// An explicit id is used as is. Otherwise the first active test drive whose
/// vehicle carries the configured sensor is chosen. When none is found the
/// machine decides: the reader profile stops with `ExitStatus::NoSession`.
pub async fn resolve_reader_session(
    resolver: &SessionResolver,
    explicit: Option<&str>,
    fsm: &mut LoopStateMachine,
    shutdown: &mut Shutdown,
) -> Result<String, ExitStatus> {
    loop {
        if shutdown.is_triggered() {
            return Err(terminate(fsm, LoopEvent::Interrupted));
        }

        let event = match resolver.resolve(explicit).await {
            Ok(Resolution::Explicit(id)) => {
                info!("[RESOLVER] Using configured test drive {}", id);
                return Ok(id);
            }
            Ok(Resolution::Listed(sessions)) => {
                if sessions.len() > 1 {
                    warn!(
                        "[RESOLVER] {} active test drives match, using the first",
                        sessions.len()
                    );
                }
                match sessions.into_iter().next() {
                    Some(session) => {
                        log_banner(&session);
                        return Ok(session.id);
                    }
                    None => {
                        log_no_session(resolver.filter());
                        LoopEvent::NoActiveSessions
                    }
                }
            }
            Err(e) => {
                error!("[RESOLVER] Failed to query test drives: {}", e);
                LoopEvent::SessionLookupFailed {
                    reason: e.to_string(),
                }
            }
        };

        let after = match advance(fsm, event) {
            ControlFlow::Continue(after) => after,
            ControlFlow::Break(status) => return Err(status),
        };
        if let ControlFlow::Break(status) = pause(fsm, shutdown, after).await {
            return Err(status);
        }
    }
}

fn log_no_session(filter: &SessionFilter) {
    match filter {
        SessionFilter::Hardware(mac) => {
            warn!("[RESOLVER] No active test drive found for RuuviTag {}", mac)
        }
        SessionFilter::All => warn!("[RESOLVER] No active test drive found"),
    }
    warn!("[RESOLVER] Start a test drive from the mobile app first, or set TEST_DRIVE_ID");
}

/// Relays every reading of one source to one test drive
pub struct ReaderLoop<S> {
    client: ApiClient,
    source: S,
    test_drive_id: String,
    fsm: LoopStateMachine,
    shutdown: Shutdown,
}

impl<S: ReadingSource> ReaderLoop<S> {
    pub fn new(
        client: ApiClient,
        source: S,
        test_drive_id: impl Into<String>,
        fsm: LoopStateMachine,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            source,
            test_drive_id: test_drive_id.into(),
            fsm,
            shutdown,
        }
    }

    pub fn machine(&self) -> &LoopStateMachine {
        &self.fsm
    }

    /// Run until interrupted or the source fails
    pub async fn run(&mut self) -> ExitStatus {
        info!(
            "[LOOP] Relaying {} readings to test drive {} (Ctrl+C to stop)",
            self.source.name(),
            self.test_drive_id
        );

        let status = self.drive().await;
        info!(
            "[LOOP] Reader stopped after {} reading(s), {} failed relay(s)",
            self.fsm.ticks(),
            self.fsm.relay_failures()
        );
        status
    }

    async fn drive(&mut self) -> ExitStatus {
        loop {
            if self.shutdown.is_triggered() {
                return terminate(&mut self.fsm, LoopEvent::Interrupted);
            }

            let after = match self.tick().await {
                ControlFlow::Continue(after) => after,
                ControlFlow::Break(status) => return status,
            };
            if let ControlFlow::Break(status) =
                pause(&mut self.fsm, &mut self.shutdown, after).await
            {
                return status;
            }
        }
    }

    /// Wait for one reading and relay it
    async fn tick(&mut self) -> ControlFlow<ExitStatus, Duration> {
        let next = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            result = self.source.next_observation() => Some(result),
        };

        let observation = match next {
            None => return ControlFlow::Break(terminate(&mut self.fsm, LoopEvent::Interrupted)),
            Some(Ok(observation)) => observation,
            Some(Err(e)) => {
                error!("[SCAN] {} source failed: {:#}", self.source.name(), e);
                let event = LoopEvent::SourceFailed {
                    reason: format!("{e:#}"),
                };
                return ControlFlow::Break(terminate(&mut self.fsm, event));
            }
        };

        log_reading(&observation.source_id, &observation.reading);
        let payload =
            normalize(&observation.reading, &self.test_drive_id).with_rssi(observation.rssi);
        let result = self.client.post_sensor(&payload).await;
        report(&mut self.fsm, SENSOR_PATH, result)?;

        advance(&mut self.fsm, LoopEvent::TickCompleted)
    }
}
