//! Simulator loop: fake readings and GPS drift for every active test drive

use super::{advance, log_banner, log_reading, pause, report, terminate, Shutdown};
use crate::api::{ApiClient, SessionResolver};
use crate::source::{LocationSource, ReadingSource};
use std::ops::ControlFlow;
use std::time::Duration;
use testdrive_shared::state_machine::{ExitStatus, LoopEvent, LoopStateMachine};
use testdrive_shared::{normalize, LOCATION_PATH, SENSOR_PATH};
use tracing::{error, info};

/// Posts one sensor reading and one location per active test drive per cycle
pub struct SimulatorLoop<S> {
    client: ApiClient,
    resolver: SessionResolver,
    source: S,
    fsm: LoopStateMachine,
    shutdown: Shutdown,
    /// Cycles that found at least one active test drive
    iteration: u64,
}

impl<S: ReadingSource + LocationSource> SimulatorLoop<S> {
    pub fn new(
        client: ApiClient,
        resolver: SessionResolver,
        source: S,
        fsm: LoopStateMachine,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            resolver,
            source,
            fsm,
            shutdown,
            iteration: 0,
        }
    }

    pub fn machine(&self) -> &LoopStateMachine {
        &self.fsm
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Run until interrupted
    pub async fn run(&mut self) -> ExitStatus {
        let origin = self.source.origin();
        info!(
            "[SIM] Simulating {} readings around {}, {} against {}",
            self.source.name(),
            origin.latitude,
            origin.longitude,
            self.client.base_url()
        );

        let status = loop {
            if self.shutdown.is_triggered() {
                break terminate(&mut self.fsm, LoopEvent::Interrupted);
            }

            let after = match self.cycle().await {
                ControlFlow::Continue(after) => after,
                ControlFlow::Break(status) => break status,
            };
            if let ControlFlow::Break(status) =
                pause(&mut self.fsm, &mut self.shutdown, after).await
            {
                break status;
            }
        };

        info!(
            "[SIM] Simulation stopped after {} update(s), {} failed relay(s)",
            self.iteration,
            self.fsm.relay_failures()
        );
        status
    }

    async fn cycle(&mut self) -> ControlFlow<ExitStatus, Duration> {
        let sessions = match self.resolver.active().await {
            Ok(sessions) if !sessions.is_empty() => sessions,
            Ok(_) => {
                info!(
                    "[SIM] No active test drives, waiting {:?}",
                    self.fsm.profile().retry_interval
                );
                return advance(&mut self.fsm, LoopEvent::NoActiveSessions);
            }
            Err(e) => {
                error!("[SIM] Failed to query test drives: {}", e);
                let event = LoopEvent::SessionLookupFailed {
                    reason: e.to_string(),
                };
                return advance(&mut self.fsm, event);
            }
        };

        self.iteration += 1;
        info!(
            "[SIM] Update #{}: {} active test drive(s)",
            self.iteration,
            sessions.len()
        );

        // Every active test drive gets its own reading and fix
        for session in &sessions {
            log_banner(session);

            let observation = match self.source.next_observation().await {
                Ok(observation) => observation,
                Err(e) => {
                    error!("[SIM] {} source failed: {:#}", self.source.name(), e);
                    let event = LoopEvent::SourceFailed {
                        reason: format!("{e:#}"),
                    };
                    return ControlFlow::Break(terminate(&mut self.fsm, event));
                }
            };
            log_reading(&observation.source_id, &observation.reading);
            let payload =
                normalize(&observation.reading, &session.id).with_rssi(observation.rssi);
            let result = self.client.post_sensor(&payload).await;
            report(&mut self.fsm, SENSOR_PATH, result)?;

            let fix = self.source.next_location(self.iteration);
            info!("[SIM] Location {}, {}", fix.latitude, fix.longitude);
            let result = self
                .client
                .post_location(&fix.into_payload(session.id.as_str()))
                .await;
            report(&mut self.fsm, LOCATION_PATH, result)?;
        }

        advance(&mut self.fsm, LoopEvent::TickCompleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{RecordedRequest, StubReply, StubServer};
    use crate::api::{ApiConfig, SessionFilter};
    use crate::driver::shutdown;
    use crate::driver::fixture::{reading, Script, ScriptedSource};
    use crate::source::{SimulatedSource, DEFAULT_ORIGIN};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use testdrive_shared::state_machine::LoopProfile;
    use testdrive_shared::TEST_DRIVES_PATH;

    const FAST: LoopProfile = LoopProfile {
        tick_interval: Duration::from_millis(5),
        retry_interval: Duration::from_millis(5),
        no_session_is_fatal: false,
    };

    fn two_sessions() -> serde_json::Value {
        json!({
            "success": true,
            "data": [
                { "id": "td-1", "status": "active",
                  "vehicle": { "year": 2023, "make": "Tesla", "model": "Model 3" },
                  "customer": { "name": "Aino" } },
                { "id": "td-2", "status": "active",
                  "vehicle": { "year": 2022, "make": "Kia", "model": "EV6" },
                  "customer": { "name": "Mikko" } }
            ]
        })
    }

    fn simulator_with<S: ReadingSource + LocationSource>(
        server: &StubServer,
        source: S,
        shutdown: Shutdown,
    ) -> SimulatorLoop<S> {
        let client = ApiClient::new(&ApiConfig {
            base_url: server.base_url(),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap();
        let resolver = SessionResolver::new(client.clone(), SessionFilter::All);
        SimulatorLoop::new(client, resolver, source, LoopStateMachine::new(FAST), shutdown)
    }

    fn simulator(server: &StubServer, shutdown: Shutdown) -> SimulatorLoop<SimulatedSource> {
        simulator_with(server, SimulatedSource::seeded(DEFAULT_ORIGIN, 11), shutdown)
    }

    fn reply(request: &RecordedRequest, sessions: serde_json::Value) -> StubReply {
        if request.path.starts_with(TEST_DRIVES_PATH) {
            StubReply::json(200, sessions)
        } else {
            StubReply::json(201, json!({ "success": true }))
        }
    }

    #[tokio::test]
    async fn test_fans_out_to_every_session() {
        let mut server = StubServer::start(|r| reply(r, two_sessions())).await;
        let (trigger, shutdown) = shutdown::channel();
        let mut sim = simulator(&server, shutdown);

        let handle = tokio::spawn(async move {
            let status = sim.run().await;
            (status, sim.iteration())
        });

        // One listing, then sensor + location for each session
        let list = server.next_request().await;
        assert_eq!(list.path, "/api/testdrives?status=active");
        let mut posts = Vec::new();
        for _ in 0..4 {
            posts.push(server.next_request().await);
        }
        trigger.trigger();

        let (status, iteration) = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("simulator did not stop")
            .unwrap();
        assert_eq!(status, ExitStatus::Clean);
        assert!(iteration >= 1);

        let paths: Vec<&str> = posts.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, [SENSOR_PATH, LOCATION_PATH, SENSOR_PATH, LOCATION_PATH]);
        assert_eq!(posts[0].json()["testDriveId"], "td-1");
        assert_eq!(posts[3].json()["testDriveId"], "td-2");

        let fix = posts[1].json();
        let lat = fix["latitude"].as_f64().unwrap();
        let lon = fix["longitude"].as_f64().unwrap();
        assert!((lat - 60.1699).abs() <= 0.0001 + 1e-9);
        assert!((lon - 24.9384).abs() <= 0.0001 + 1e-9);

        let battery = posts[0].json()["battery"].as_f64().unwrap();
        assert!((93.0..=100.0).contains(&battery), "battery {battery}");
        assert!(posts[0].json().get("rssi").is_none());
    }

    #[tokio::test]
    async fn test_readings_come_from_the_source() {
        let mut server = StubServer::start(|r| reply(r, two_sessions())).await;
        let source = ScriptedSource::new([
            Script::Yield(reading(19.25, 2900.0)),
            Script::Fail("generator broke"),
        ]);
        let (_trigger, shutdown) = shutdown::channel();
        let mut sim = simulator_with(&server, source, shutdown);

        let status = tokio::time::timeout(Duration::from_secs(5), sim.run())
            .await
            .expect("simulator did not stop");
        assert_eq!(status, ExitStatus::Fatal);
        assert_eq!(sim.iteration(), 1);

        let requests = server.drain();
        let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/api/testdrives?status=active", SENSOR_PATH, LOCATION_PATH]);

        let sensor = requests[1].json();
        assert_eq!(sensor["testDriveId"], "td-1");
        assert_eq!(sensor["temperature"], json!(19.25));
        assert_eq!(sensor["rssi"], json!(-70));
        let location = requests[2].json();
        assert_eq!(location["latitude"], json!(60.1699));
        assert_eq!(location["longitude"], json!(24.9384));
    }

    #[tokio::test]
    async fn test_waits_while_nothing_is_active() {
        let lists = Arc::new(AtomicUsize::new(0));
        let counter = lists.clone();
        let server = StubServer::start(move |r| {
            counter.fetch_add(1, Ordering::SeqCst);
            reply(r, json!({ "success": true, "data": [] }))
        })
        .await;
        let (trigger, shutdown) = shutdown::channel();
        let mut sim = simulator(&server, shutdown);

        let handle = tokio::spawn(async move {
            let status = sim.run().await;
            (status, sim.iteration(), sim.machine().ticks())
        });
        while lists.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        trigger.trigger();

        let (status, iteration, ticks) = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("simulator did not stop")
            .unwrap();
        assert_eq!(status, ExitStatus::Clean);
        assert_eq!(iteration, 0);
        assert_eq!(ticks, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_retried() {
        let lists = Arc::new(AtomicUsize::new(0));
        let counter = lists.clone();
        let server = StubServer::start(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            StubReply::raw(500, "boom")
        })
        .await;
        let (trigger, shutdown) = shutdown::channel();
        let mut sim = simulator(&server, shutdown);

        let handle = tokio::spawn(async move { sim.run().await });
        while lists.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        trigger.trigger();

        let status = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("simulator did not stop")
            .unwrap();
        assert_eq!(status, ExitStatus::Clean);
    }
}
