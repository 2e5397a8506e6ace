//! FireBridge Core - Shared types
//!
//! This crate provides the types every FireBridge component agrees on: the
//! device address, bridge configuration, the rendered HTTP request and the
//! error taxonomy handed back to the host.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod request;

pub use config::{BridgeConfig, FIRETV_API_KEY};
pub use endpoint::{DeviceEndpoint, Scheme, DEFAULT_CONTROL_PORT, DEFAULT_WAKE_PORT};
pub use error::{CommandError, Result};
pub use request::{DeviceRequest, HttpMethod};
