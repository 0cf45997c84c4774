//! Test drive relay
//!
//! Reads RuuviTag environmental data (from a real tag over Bluetooth LE or
//! from a simulator) and relays it to the test drive tracking API.

pub mod api;
pub mod driver;
pub mod source;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the fmt subscriber; `RUST_LOG` overrides the INFO default
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
