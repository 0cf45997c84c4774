//! Wire types for the test drive API
//!
//! Sessions ("test drives") are owned by the remote API. The relay only
//! reads them and attaches sensor and location records through POSTs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path listing test drives (`?status=active` narrows to running ones)
pub const TEST_DRIVES_PATH: &str = "/api/testdrives";

/// Path accepting one sensor reading
pub const SENSOR_PATH: &str = "/api/ruuvitag/sensor";

/// Path accepting one GPS fix
pub const LOCATION_PATH: &str = "/api/ruuvitag/location";

/// Standard response wrapper used by every API route
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Lifecycle status of a test drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
    #[serde(other)]
    Other,
}

impl SessionStatus {
    /// Value used in the `status` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Other => "other",
        }
    }
}

/// Vehicle attached to a test drive
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Hardware address of the RuuviTag installed in the vehicle
    #[serde(default)]
    pub ruuvi_tag_mac: Option<String>,
}

impl Vehicle {
    /// Human-readable "year make model" line
    pub fn describe(&self) -> String {
        let year = self.year.map(|y| y.to_string());
        [year.as_deref(), self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .map(|part| part.unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub name: Option<String>,
}

/// A test drive as returned by `GET /api/testdrives`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub vehicle: Vehicle,
    #[serde(default)]
    pub customer: Customer,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Check whether this session's vehicle carries the given sensor.
    ///
    /// MAC addresses are compared case-insensitively.
    pub fn matches_hardware(&self, hardware_id: &str) -> bool {
        self.vehicle
            .ruuvi_tag_mac
            .as_deref()
            .is_some_and(|mac| mac.eq_ignore_ascii_case(hardware_id))
    }

    pub fn customer_name(&self) -> &str {
        self.customer.name.as_deref().unwrap_or("?")
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, customer {})",
            self.id,
            self.vehicle.describe(),
            self.customer_name()
        )
    }
}

/// Canonical body for `POST /api/ruuvitag/sensor`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    pub test_drive_id: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity, percent
    pub humidity: Option<f64>,
    /// Hectopascal
    pub pressure: Option<f64>,
    /// g
    pub acceleration_x: f64,
    pub acceleration_y: f64,
    pub acceleration_z: f64,
    /// Percent of full charge
    pub battery: f64,
    /// Signal strength of the advertisement, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
}

impl SensorPayload {
    pub fn with_rssi(mut self, rssi: Option<i16>) -> Self {
        self.rssi = rssi;
        self
    }
}

/// Body for `POST /api/ruuvitag/location`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub test_drive_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A GPS coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Bind this coordinate to a test drive
    pub fn into_payload(self, test_drive_id: impl Into<String>) -> LocationPayload {
        LocationPayload {
            test_drive_id: test_drive_id.into(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}
