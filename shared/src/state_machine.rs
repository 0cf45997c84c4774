//! Relay Loop State Machine
//!
//! Decides, for every outcome the loop observes, whether to keep going,
//! wait, or stop, and with which exit status. All retry policy lives here.

use crate::intervals;
use std::time::Duration;

/// Events reported by a relay loop
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Every relay for the current tick was attempted
    TickCompleted,
    /// The API reported no matching active test drive
    NoActiveSessions,
    /// The test drive query failed (network, status or body)
    SessionLookupFailed { reason: String },
    /// One POST failed
    RelayFailed { endpoint: &'static str, reason: String },
    /// The data source raised an unrecoverable error
    SourceFailed { reason: String },
    /// User asked the process to stop
    Interrupted,
}

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// User interrupt or normal completion
    Clean,
    /// No active test drive for this sensor
    NoSession,
    /// Unexpected error
    Fatal,
}

impl ExitStatus {
    /// Process exit code
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::NoSession | ExitStatus::Fatal => 1,
        }
    }
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(ExitStatus),
}

/// Result of processing an event
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Keep running after waiting `after`
    Continue { after: Duration },
    /// Loop is now stopped
    Stop(ExitStatus),
    /// Event arrived after the loop stopped
    Invalid { event: LoopEvent },
}

/// Timing and policy of one loop flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopProfile {
    /// Pause after a completed tick
    pub tick_interval: Duration,
    /// Pause before re-checking for active test drives
    pub retry_interval: Duration,
    /// Whether a missing test drive ends the process
    pub no_session_is_fatal: bool,
}

impl LoopProfile {
    /// Real-sensor reader: 2 s between broadcasts, missing session is fatal
    pub const READER: LoopProfile = LoopProfile {
        tick_interval: Duration::from_millis(intervals::READER_TICK_MS),
        retry_interval: Duration::from_millis(intervals::NO_SESSION_RETRY_MS),
        no_session_is_fatal: true,
    };

    /// Simulator: 5 s between cycles, waits 10 s while nothing is active
    pub const SIMULATOR: LoopProfile = LoopProfile {
        tick_interval: Duration::from_millis(intervals::SIMULATOR_TICK_MS),
        retry_interval: Duration::from_millis(intervals::NO_SESSION_RETRY_MS),
        no_session_is_fatal: false,
    };
}

/// The relay loop state machine
#[derive(Debug)]
pub struct LoopStateMachine {
    profile: LoopProfile,
    state: LoopState,
    ticks: u64,
    relay_failures: u64,
}

impl LoopStateMachine {
    /// Create a new state machine in Running state
    pub fn new(profile: LoopProfile) -> Self {
        Self {
            profile,
            state: LoopState::Running,
            ticks: 0,
            relay_failures: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn profile(&self) -> &LoopProfile {
        &self.profile
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Number of failed POSTs so far
    pub fn relay_failures(&self) -> u64 {
        self.relay_failures
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LoopEvent) -> TransitionResult {
        if let LoopState::Stopped(_) = self.state {
            return TransitionResult::Invalid { event };
        }

        match event {
            LoopEvent::TickCompleted => {
                self.ticks += 1;
                TransitionResult::Continue {
                    after: self.profile.tick_interval,
                }
            }
            // A failed POST never ends the tick; the rest of it proceeds at once
            LoopEvent::RelayFailed { .. } => {
                self.relay_failures += 1;
                TransitionResult::Continue {
                    after: Duration::ZERO,
                }
            }
            LoopEvent::NoActiveSessions | LoopEvent::SessionLookupFailed { .. } => {
                if self.profile.no_session_is_fatal {
                    self.stop(ExitStatus::NoSession)
                } else {
                    TransitionResult::Continue {
                        after: self.profile.retry_interval,
                    }
                }
            }
            LoopEvent::SourceFailed { .. } => self.stop(ExitStatus::Fatal),
            LoopEvent::Interrupted => self.stop(ExitStatus::Clean),
        }
    }

    fn stop(&mut self, status: ExitStatus) -> TransitionResult {
        self.state = LoopState::Stopped(status);
        TransitionResult::Stop(status)
    }
}
