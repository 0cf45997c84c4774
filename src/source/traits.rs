//! Data source abstraction for pluggable reading producers

use anyhow::Result;
use async_trait::async_trait;
use testdrive_shared::{Coordinate, RawReading};

/// One reading together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Hardware address (device) or a fixed label (simulator)
    pub source_id: String,
    pub reading: RawReading,
    /// Signal strength of the broadcast, if known
    pub rssi: Option<i16>,
}

/// Produces raw readings one at a time
#[async_trait]
pub trait ReadingSource: Send {
    /// Wait for the next reading.
    ///
    /// May wait indefinitely. An error means the source is unusable.
    async fn next_observation(&mut self) -> Result<Observation>;

    /// Human-readable name for this source
    fn name(&self) -> &'static str;
}

/// Produces GPS fixes for a simulated drive
pub trait LocationSource: Send {
    /// Point the fixes drift around
    fn origin(&self) -> Coordinate;

    /// Fix for the given update number
    fn next_location(&mut self, iteration: u64) -> Coordinate;
}
