//! RuuviTag advertisement decoding
//!
//! RuuviTags broadcast their measurements as manufacturer-specific data
//! under company id `0x0499`. Only data format 5 (RAWv2) is supported:
//!
//! ```text
//! [0]      format (0x05)
//! [1..3]   temperature   i16, 0.005 C
//! [3..5]   humidity      u16, 0.0025 %
//! [5..7]   pressure      u16, Pa - 50000
//! [7..13]  acceleration  3 x i16, mG
//! [13..15] power         11 bits battery (mV - 1600), 5 bits tx power
//! [15]     movement counter
//! [16..18] measurement sequence
//! [18..24] MAC (optional)
//! ```
//!
//! Every field has an "invalid" sentinel, which decodes to `None`.

use bytes::Buf;
use std::collections::HashMap;
use thiserror::Error;

use crate::reading::DeviceReading;
use crate::round_to;

/// Bluetooth SIG company identifier of Ruuvi Innovations
pub const RUUVI_MANUFACTURER_ID: u16 = 0x0499;

/// Data format byte of RAWv2 advertisements
pub const FORMAT_RAWV2: u8 = 0x05;

/// Minimum RAWv2 payload length (MAC suffix is optional)
pub const RAWV2_MIN_LEN: usize = 18;

/// Errors that can occur while decoding an advertisement
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No Ruuvi manufacturer data in advertisement")]
    NotRuuvi,

    #[error("Unsupported RuuviTag data format: {0:#04x}")]
    UnsupportedFormat(u8),

    #[error("Not enough data: need {needed} bytes, have {available}")]
    NotEnoughData { needed: usize, available: usize },
}

/// Decode the Ruuvi entry of a manufacturer-data map
pub fn decode_advertisement(
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> Result<DeviceReading, DecodeError> {
    let data = manufacturer_data
        .get(&RUUVI_MANUFACTURER_ID)
        .ok_or(DecodeError::NotRuuvi)?;
    decode_format5(data)
}

/// Decode a RAWv2 payload (company id already stripped)
pub fn decode_format5(data: &[u8]) -> Result<DeviceReading, DecodeError> {
    let format = *data.first().ok_or(DecodeError::NotEnoughData {
        needed: RAWV2_MIN_LEN,
        available: 0,
    })?;
    if format != FORMAT_RAWV2 {
        return Err(DecodeError::UnsupportedFormat(format));
    }
    if data.len() < RAWV2_MIN_LEN {
        return Err(DecodeError::NotEnoughData {
            needed: RAWV2_MIN_LEN,
            available: data.len(),
        });
    }

    let mut buf = &data[1..RAWV2_MIN_LEN];

    let temperature = buf.get_i16();
    let humidity = buf.get_u16();
    let pressure = buf.get_u16();
    let acceleration = [buf.get_i16(), buf.get_i16(), buf.get_i16()];
    let power = buf.get_u16();
    let movement_counter = buf.get_u8();
    let measurement_sequence = buf.get_u16();

    let battery_raw = power >> 5;
    let tx_raw = power & 0x1F;

    Ok(DeviceReading {
        temperature: (temperature != i16::MIN).then(|| round_to(temperature as f64 * 0.005, 2)),
        humidity: (humidity != u16::MAX).then(|| round_to(humidity as f64 * 0.0025, 2)),
        pressure: (pressure != u16::MAX)
            .then(|| round_to((pressure as f64 + 50_000.0) / 100.0, 2)),
        acceleration_x: millig_to_g(acceleration[0]),
        acceleration_y: millig_to_g(acceleration[1]),
        acceleration_z: millig_to_g(acceleration[2]),
        battery: (battery_raw != 0x7FF).then(|| battery_raw as f64 + 1600.0),
        tx_power: (tx_raw != 0x1F).then(|| tx_raw as i8 * 2 - 40),
        movement_counter: (movement_counter != u8::MAX).then_some(movement_counter),
        measurement_sequence: (measurement_sequence != u16::MAX).then_some(measurement_sequence),
    })
}

fn millig_to_g(raw: i16) -> Option<f64> {
    (raw != i16::MIN).then(|| raw as f64 / 1000.0)
}
