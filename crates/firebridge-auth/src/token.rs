//! Device-issued authentication tokens

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token issued by the device after a successful PIN verification
///
/// Opaque to the bridge and without a known expiry: it stays valid until the
/// device answers 401/403, e.g. after pairing is removed in the TV settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    value: String,
    issued_at: DateTime<Utc>,
}

impl AuthToken {
    /// Wrap a freshly issued token value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issued_at: Utc::now(),
        }
    }

    /// Raw token value, as sent to the device
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Shortened form safe for logs
    pub fn masked(&self) -> String {
        let prefix: String = self.value.chars().take(4).collect();
        format!("{}…", prefix)
    }
}

// Never print the full token.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &self.masked())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = AuthToken::new("abcdef123456");
        let debug = format!("{:?}", token);
        assert!(debug.contains("abcd"));
        assert!(!debug.contains("abcdef123456"));
    }

    #[test]
    fn test_serde_keeps_full_value() {
        let token = AuthToken::new("abcdef123456");
        let json = serde_json::to_string(&token).unwrap();
        let back: AuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert_eq!(back.value(), "abcdef123456");
    }
}
