//! Payload normalization
//!
//! Maps a source-specific [`RawReading`] onto the canonical
//! [`SensorPayload`]. The two sources scale battery differently: the device
//! reports millivolts on a clamped 2000..3000 mV range, the simulator reports
//! volts and is scaled linearly without clamping. Which of the two is right
//! is an open product question, so both stay as they are.

use crate::api::SensorPayload;
use crate::reading::{DeviceReading, RawReading, SimulatedReading};

/// Voltage treated as an empty RuuviTag cell
pub const BATTERY_EMPTY_MV: f64 = 2000.0;

/// Voltage treated as a full RuuviTag cell
pub const BATTERY_FULL_MV: f64 = 3000.0;

/// Percent per volt used for simulated readings
pub const SIMULATED_PERCENT_PER_VOLT: f64 = 33.33;

/// Battery level reported when the simulator omits a voltage
pub const SIMULATED_DEFAULT_PERCENT: f64 = 100.0;

/// Convert a device battery voltage to a percentage in `[0, 100]`
pub fn battery_percent_from_millivolts(millivolts: f64) -> f64 {
    let span = BATTERY_FULL_MV - BATTERY_EMPTY_MV;
    (((millivolts - BATTERY_EMPTY_MV) / span) * 100.0).clamp(0.0, 100.0)
}

/// Convert a simulated battery voltage to a percentage (unclamped)
pub fn battery_percent_from_volts(volts: f64) -> f64 {
    volts * SIMULATED_PERCENT_PER_VOLT
}

/// Normalize one reading for the given test drive
pub fn normalize(reading: &RawReading, test_drive_id: &str) -> SensorPayload {
    match reading {
        RawReading::Device(r) => normalize_device(r, test_drive_id),
        RawReading::Simulated(r) => normalize_simulated(r, test_drive_id),
    }
}

fn normalize_device(reading: &DeviceReading, test_drive_id: &str) -> SensorPayload {
    let millivolts = reading.battery.unwrap_or(BATTERY_FULL_MV);

    SensorPayload {
        test_drive_id: test_drive_id.to_string(),
        temperature: reading.temperature,
        humidity: reading.humidity,
        pressure: reading.pressure,
        acceleration_x: reading.acceleration_x.unwrap_or(0.0),
        acceleration_y: reading.acceleration_y.unwrap_or(0.0),
        acceleration_z: reading.acceleration_z.unwrap_or(0.0),
        battery: battery_percent_from_millivolts(millivolts),
        rssi: None,
    }
}

fn normalize_simulated(reading: &SimulatedReading, test_drive_id: &str) -> SensorPayload {
    let battery = reading
        .battery_voltage
        .map(battery_percent_from_volts)
        .unwrap_or(SIMULATED_DEFAULT_PERCENT);

    SensorPayload {
        test_drive_id: test_drive_id.to_string(),
        temperature: Some(reading.temperature),
        humidity: Some(reading.humidity),
        pressure: Some(reading.pressure),
        acceleration_x: reading.acceleration_x.unwrap_or(0.0),
        acceleration_y: reading.acceleration_y.unwrap_or(0.0),
        acceleration_z: reading.acceleration_z.unwrap_or(0.0),
        battery,
        rssi: None,
    }
}
