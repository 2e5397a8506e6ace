//! FireBridge Client - Fire TV REST API access
//!
//! A thin wrapper over `reqwest` that knows how to address a Fire TV's local
//! control API, which headers it expects, and how to classify its failures:
//!
//! - 2xx: success, body returned as JSON
//! - 401/403: [`DeviceError::Unauthorized`], the token must be replaced
//! - other statuses: [`DeviceError::Rejected`], the device refused the command
//! - transport failures and timeouts: [`DeviceError::Unreachable`]
//!
//! Connection-level failures get exactly one immediate retry. Anything
//! broader is the caller's decision.

mod client;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{DeviceClient, USER_AGENT};
pub use error::{DeviceError, DeviceResult};
