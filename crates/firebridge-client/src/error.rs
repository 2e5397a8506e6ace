//! Device client error types

use firebridge_core::CommandError;
use thiserror::Error;

/// Classified failures of a single device request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Connection refused, reset, DNS failure or timeout
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// The device did not accept the token (HTTP 401/403)
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The device refused this request
    #[error("Rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The HTTP client could not be built or the request could not be formed
    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return DeviceError::Client(err.to_string());
        }
        if err.is_timeout() {
            return DeviceError::Unreachable(format!("request timed out: {}", err));
        }
        DeviceError::Unreachable(err.to_string())
    }

    /// Whether this error means the token is no longer valid
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DeviceError::Unauthorized { .. })
    }
}

impl From<DeviceError> for CommandError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Unreachable(msg) | DeviceError::Client(msg) => {
                CommandError::DeviceUnreachable(msg)
            }
            DeviceError::Unauthorized { status } => CommandError::NotAuthenticated(format!(
                "device rejected the token (HTTP {})",
                status
            )),
            DeviceError::Rejected { status, message } => {
                CommandError::CommandRejected(format!("HTTP {}: {}", status, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_command_error() {
        let err: CommandError = DeviceError::Unauthorized { status: 401 }.into();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));

        let err: CommandError = DeviceError::Rejected {
            status: 404,
            message: "Package not found".into(),
        }
        .into();
        assert_eq!(
            err,
            CommandError::CommandRejected("HTTP 404: Package not found".into())
        );

        let err: CommandError = DeviceError::Unreachable("refused".into()).into();
        assert!(err.is_transient());
    }
}
