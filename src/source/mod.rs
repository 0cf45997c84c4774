//! Reading sources
//!
//! Both the physical RuuviTag and the simulator implement [`ReadingSource`],
//! so the loops can run against either (or a scripted fixture in tests).

#[cfg(feature = "bluetooth")]
pub mod device;
pub mod simulated;
pub mod traits;

#[cfg(feature = "bluetooth")]
pub use device::DeviceSource;
pub use simulated::{SimulatedSource, DEFAULT_ORIGIN};
pub use traits::{LocationSource, Observation, ReadingSource};
