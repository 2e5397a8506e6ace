//! Error types handed back to the host framework

use thiserror::Error;

/// Outward error taxonomy for every host-facing FireBridge operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed command identifier. Not retried.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// No token, or the device rejected it. Pairing must be run again.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// The PIN entry window elapsed or the pairing session was replaced.
    #[error("Pairing expired, request a new PIN")]
    PairingExpired,

    /// Network failure or timeout. Safe to retry.
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),

    /// The device refused this specific command (e.g. app not installed).
    #[error("Command rejected by device: {0}")]
    CommandRejected(String),

    /// The token could not be persisted or removed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias using FireBridge's outward error
pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// Whether the host may retry the same call without user involvement
    pub fn is_transient(&self) -> bool {
        matches!(self, CommandError::DeviceUnreachable(_))
    }

    /// Whether the host must run pairing again before sending commands
    pub fn requires_pairing(&self) -> bool {
        matches!(
            self,
            CommandError::NotAuthenticated(_) | CommandError::PairingExpired
        )
    }
}
