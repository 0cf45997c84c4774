//! Pseudo-random RuuviTag readings and GPS drift for exercising the API
//! without hardware.

use super::traits::{LocationSource, Observation, ReadingSource};
use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use testdrive_shared::{round_to, Coordinate, SimulatedReading};

/// Helsinki city centre
pub const DEFAULT_ORIGIN: Coordinate = Coordinate::new(60.1699, 24.9384);

/// Maximum drift per iteration, in degrees
pub const DRIFT_PER_ITERATION: f64 = 0.0001;

const TEMPERATURE_C: RangeInclusive<f64> = 18.0..=25.0;
const HUMIDITY_PCT: RangeInclusive<f64> = 30.0..=60.0;
const PRESSURE_HPA: RangeInclusive<f64> = 990.0..=1020.0;
const BATTERY_V: RangeInclusive<f64> = 2.8..=3.0;
const LATERAL_G: RangeInclusive<f64> = -0.5..=0.5;
const VERTICAL_G: RangeInclusive<f64> = 0.8..=1.2;

/// Simulated RuuviTag
pub struct SimulatedSource {
    rng: StdRng,
    origin: Coordinate,
}

impl SimulatedSource {
    /// Create a source seeded from the OS
    pub fn new(origin: Coordinate) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            origin,
        }
    }

    /// Create a reproducible source
    pub fn seeded(origin: Coordinate, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            origin,
        }
    }

    /// Draw a fresh reading
    pub fn next_reading(&mut self) -> SimulatedReading {
        SimulatedReading {
            temperature: round_to(self.rng.random_range(TEMPERATURE_C), 2),
            humidity: round_to(self.rng.random_range(HUMIDITY_PCT), 2),
            pressure: round_to(self.rng.random_range(PRESSURE_HPA), 2),
            battery_voltage: Some(round_to(self.rng.random_range(BATTERY_V), 3)),
            acceleration_x: Some(round_to(self.rng.random_range(LATERAL_G), 3)),
            acceleration_y: Some(round_to(self.rng.random_range(LATERAL_G), 3)),
            acceleration_z: Some(round_to(self.rng.random_range(VERTICAL_G), 3)),
            movement_counter: self.rng.random(),
        }
    }
}

impl LocationSource for SimulatedSource {
    fn origin(&self) -> Coordinate {
        self.origin
    }

    /// Position for the given iteration.
    ///
    /// Each axis drifts by at most `iteration * DRIFT_PER_ITERATION` degrees
    /// from the origin, so the spread grows as the drive goes on.
    fn next_location(&mut self, iteration: u64) -> Coordinate {
        let offset = iteration as f64 * DRIFT_PER_ITERATION;
        let lat = self.origin.latitude + offset * self.rng.random_range(-1.0..=1.0);
        let lon = self.origin.longitude + offset * self.rng.random_range(-1.0..=1.0);
        Coordinate::new(round_to(lat, 6), round_to(lon, 6))
    }
}

#[async_trait]
impl ReadingSource for SimulatedSource {
    async fn next_observation(&mut self) -> Result<Observation> {
        Ok(Observation {
            source_id: "simulated".into(),
            reading: self.next_reading().into(),
            rssi: None,
        })
    }

    fn name(&self) -> &'static str {
        "Simulated"
    }
}
