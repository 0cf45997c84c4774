//! Raw sensor readings
//!
//! Each data source reports its own shape: the Bluetooth driver uses
//! snake_case keys with battery in millivolts, the simulator uses camelCase
//! keys with battery in volts. A reading lives for one loop iteration.

use serde::Deserialize;

/// Reading decoded from a physical RuuviTag broadcast
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceReading {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity, percent
    pub humidity: Option<f64>,
    /// Hectopascal
    pub pressure: Option<f64>,
    /// g
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    /// Battery voltage in millivolts
    pub battery: Option<f64>,
    /// dBm
    pub tx_power: Option<i8>,
    pub movement_counter: Option<u8>,
    pub measurement_sequence: Option<u16>,
}

/// Reading synthesized by the simulator
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedReading {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// Battery voltage in volts
    pub battery_voltage: Option<f64>,
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub movement_counter: u8,
}

/// A reading in whichever shape its source produced
#[derive(Debug, Clone, PartialEq)]
pub enum RawReading {
    Device(DeviceReading),
    Simulated(SimulatedReading),
}

impl RawReading {
    pub fn temperature(&self) -> Option<f64> {
        match self {
            RawReading::Device(r) => r.temperature,
            RawReading::Simulated(r) => Some(r.temperature),
        }
    }

    pub fn humidity(&self) -> Option<f64> {
        match self {
            RawReading::Device(r) => r.humidity,
            RawReading::Simulated(r) => Some(r.humidity),
        }
    }

    pub fn pressure(&self) -> Option<f64> {
        match self {
            RawReading::Device(r) => r.pressure,
            RawReading::Simulated(r) => Some(r.pressure),
        }
    }

    /// Acceleration as reported, before any defaulting
    pub fn acceleration(&self) -> [Option<f64>; 3] {
        match self {
            RawReading::Device(r) => [r.acceleration_x, r.acceleration_y, r.acceleration_z],
            RawReading::Simulated(r) => [r.acceleration_x, r.acceleration_y, r.acceleration_z],
        }
    }
}

impl From<DeviceReading> for RawReading {
    fn from(reading: DeviceReading) -> Self {
        RawReading::Device(reading)
    }
}

impl From<SimulatedReading> for RawReading {
    fn from(reading: SimulatedReading) -> Self {
        RawReading::Simulated(reading)
    }
}
