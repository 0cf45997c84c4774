//! Test Drive Relay Shared Types
//!
//! This crate provides the wire types, reading shapes, normalization and
//! RuuviTag advertisement decoding shared by the real-sensor reader and the
//! simulator.

pub mod api;
pub mod normalize;
pub mod reading;
pub mod ruuvi;
pub mod state_machine;

// Re-export commonly used types at crate root
pub use api::*;
pub use normalize::normalize;
pub use reading::{DeviceReading, RawReading, SimulatedReading};

/// Default base URL of the test drive API
pub const DEFAULT_API_URL: &str = "https://ruuvitag-api-production.up.railway.app";

/// Placeholder MAC used when no RuuviTag address is configured
pub const DEFAULT_RUUVITAG_MAC: &str = "AA:BB:CC:DD:EE:FF";

/// Timing parameters for the relay loops
pub mod intervals {
    /// Pause between successive device broadcasts in the reader
    pub const READER_TICK_MS: u64 = 2000;

    /// Pause between simulator polling cycles
    pub const SIMULATOR_TICK_MS: u64 = 5000;

    /// Wait before re-checking when no active test drive exists
    pub const NO_SESSION_RETRY_MS: u64 = 10000;

    /// Upper bound for every HTTP request
    pub const REQUEST_TIMEOUT_MS: u64 = 10000;
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
