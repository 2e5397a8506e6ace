//! Device addressing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default port of the Fire TV REST control API
pub const DEFAULT_CONTROL_PORT: u16 = 8080;

/// Default port of the DIAL service used to wake a sleeping device
pub const DEFAULT_WAKE_PORT: u16 = 8009;

/// URL scheme used for the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical device on the local network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    /// IP address or hostname
    pub host: String,
    /// Control API port
    pub port: u16,
    /// Control API scheme
    #[serde(default)]
    pub scheme: Scheme,
    /// DIAL wake-up port
    #[serde(default = "default_wake_port")]
    pub wake_port: u16,
}

fn default_wake_port() -> u16 {
    DEFAULT_WAKE_PORT
}

impl DeviceEndpoint {
    /// Create an endpoint for the given host and control port.
    ///
    /// Real devices only speak HTTPS on the control port. Loopback hosts are
    /// simulators and use plain HTTP.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let scheme = if is_loopback(&host) {
            Scheme::Http
        } else {
            Scheme::Https
        };

        Self {
            host,
            port,
            scheme,
            wake_port: DEFAULT_WAKE_PORT,
        }
    }

    /// Builder pattern: set scheme
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Builder pattern: set the DIAL wake-up port
    pub fn with_wake_port(mut self, port: u16) -> Self {
        self.wake_port = port;
        self
    }

    /// Base URL of the control API, e.g. `https://192.168.1.20:8080`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.url_host(), self.port)
    }

    /// DIAL wake-up URL. Always plain HTTP.
    pub fn wake_url(&self) -> String {
        format!("http://{}:{}/apps/FireTVRemote", self.url_host(), self.wake_port)
    }

    /// Stable identifier used as the storage key, e.g. `firetv_192_168_1_20_8080`
    pub fn identifier(&self) -> String {
        let host: String = self
            .host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("firetv_{}_{}", host, self.port)
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.url_host(), self.port)
    }
}

impl std::str::FromStr for DeviceEndpoint {
    type Err = String;

    /// Parse `host` or `host:port`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Device address is empty".to_string());
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("Unterminated IPv6 address: {}", s))?;
            if host.is_empty() {
                return Err(format!("Invalid device address: {}", s));
            }
            let port = match tail {
                "" => DEFAULT_CONTROL_PORT,
                _ => {
                    let port = tail
                        .strip_prefix(':')
                        .ok_or_else(|| format!("Invalid device address: {}", s))?;
                    port.parse::<u16>()
                        .map_err(|_| format!("Invalid port: {}", port))?
                }
            };
            return Ok(DeviceEndpoint::new(host, port));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("Invalid port: {}", port))?;
                Ok(DeviceEndpoint::new(host, port))
            }
            _ => Ok(DeviceEndpoint::new(s, DEFAULT_CONTROL_PORT)),
        }
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(
        host.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "0.0.0.0" | "::1" | "[::1]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_device_uses_https() {
        let endpoint = DeviceEndpoint::new("192.168.1.20", 8080);
        assert_eq!(endpoint.scheme, Scheme::Https);
        assert_eq!(endpoint.base_url(), "https://192.168.1.20:8080");
        assert_eq!(endpoint.wake_url(), "http://192.168.1.20:8009/apps/FireTVRemote");
    }

    #[test]
    fn test_loopback_uses_http() {
        let endpoint = DeviceEndpoint::new("127.0.0.1", 9000);
        assert_eq!(endpoint.scheme, Scheme::Http);
        assert_eq!(endpoint.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_identifier() {
        let endpoint = DeviceEndpoint::new("192.168.1.20", 8080);
        assert_eq!(endpoint.identifier(), "firetv_192_168_1_20_8080");
    }

    #[test]
    fn test_parse() {
        let endpoint: DeviceEndpoint = "10.0.0.5:8443".parse().unwrap();
        assert_eq!(endpoint.host, "10.0.0.5");
        assert_eq!(endpoint.port, 8443);

        let endpoint: DeviceEndpoint = "10.0.0.5".parse().unwrap();
        assert_eq!(endpoint.port, DEFAULT_CONTROL_PORT);

        let endpoint: DeviceEndpoint = "[::1]:8080".parse().unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.scheme, Scheme::Http);
        assert_eq!(endpoint.base_url(), "http://[::1]:8080");
        assert_eq!(endpoint.to_string(), "[::1]:8080");
        assert_eq!(endpoint.to_string().parse::<DeviceEndpoint>().unwrap(), endpoint);

        let endpoint: DeviceEndpoint = "[fe80::1]".parse().unwrap();
        assert_eq!(endpoint.host, "fe80::1");
        assert_eq!(endpoint.port, DEFAULT_CONTROL_PORT);
        assert_eq!(endpoint.base_url(), "https://[fe80::1]:8080");

        let endpoint: DeviceEndpoint = "fe80::1".parse().unwrap();
        assert_eq!(endpoint.host, "fe80::1");
        assert_eq!(endpoint.port, DEFAULT_CONTROL_PORT);

        assert!("[::1".parse::<DeviceEndpoint>().is_err());
        assert!("[::1]8080".parse::<DeviceEndpoint>().is_err());
        assert!("[::1]:port".parse::<DeviceEndpoint>().is_err());
        assert!("[]:8080".parse::<DeviceEndpoint>().is_err());
        assert!("10.0.0.5:http".parse::<DeviceEndpoint>().is_err());
        assert!("".parse::<DeviceEndpoint>().is_err());
    }
}
