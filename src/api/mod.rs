//! Remote test drive API access
//!
//! This module handles:
//! - Listing test drives and resolving the one(s) to target
//! - Relaying sensor and location payloads (POST, bounded timeout)

mod client;
mod resolver;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{ApiClient, ApiConfig, ApiError};
pub use resolver::{Resolution, SessionFilter, SessionResolver};
