//! Configuration types for FireBridge

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed application key the Fire TV REST API expects from remote apps
pub const FIRETV_API_KEY: &str = "0987654321";

/// Main configuration for a bridge session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Timeout for command requests in milliseconds
    pub request_timeout_ms: u64,
    /// Timeout for the PIN display request in milliseconds
    pub pairing_timeout_ms: u64,
    /// How long a displayed PIN stays valid, in milliseconds
    pub pin_validity_ms: u64,
    /// Device segment of the API paths (`/v1/<device>/...`)
    pub device_path: String,
    /// Value sent in the `X-Api-Key` header
    pub api_key: String,
    /// Name shown on the TV while pairing
    pub friendly_name: String,
    /// Send a DIAL wake-up before requesting a PIN
    pub wake_before_pairing: bool,
    /// Delay after a wake-up before talking to the control API, in milliseconds
    pub wake_settle_ms: u64,
    /// Wake the device before a command when idle for this many seconds
    pub idle_wake_after_secs: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            pairing_timeout_ms: 15_000,
            pin_validity_ms: 60_000,
            device_path: "FireTV".to_string(),
            api_key: FIRETV_API_KEY.to_string(),
            friendly_name: "UC Remote".to_string(),
            wake_before_pairing: true,
            wake_settle_ms: 2_000,
            idle_wake_after_secs: None,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set command request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set PIN display request timeout
    pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
        self.pairing_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set PIN validity window
    pub fn with_pin_validity(mut self, validity: Duration) -> Self {
        self.pin_validity_ms = validity.as_millis() as u64;
        self
    }

    /// Builder pattern: set the friendly name shown during pairing
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = name.into();
        self
    }

    /// Builder pattern: enable or disable wake-up before pairing
    pub fn with_wake_before_pairing(mut self, wake: bool) -> Self {
        self.wake_before_pairing = wake;
        self
    }

    /// Builder pattern: set the settle delay after a wake-up
    pub fn with_wake_settle(mut self, settle: Duration) -> Self {
        self.wake_settle_ms = settle.as_millis() as u64;
        self
    }

    /// Builder pattern: wake the device before commands after this much idle time
    pub fn with_idle_wake_after(mut self, idle: Option<Duration>) -> Self {
        self.idle_wake_after_secs = idle.map(|d| d.as_secs());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_millis(self.pairing_timeout_ms)
    }

    pub fn pin_validity(&self) -> Duration {
        Duration::from_millis(self.pin_validity_ms)
    }

    pub fn wake_settle(&self) -> Duration {
        Duration::from_millis(self.wake_settle_ms)
    }

    pub fn idle_wake_after(&self) -> Option<Duration> {
        self.idle_wake_after_secs.map(Duration::from_secs)
    }
}
