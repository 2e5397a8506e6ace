//! Rendered HTTP requests against the device REST API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP methods the device API uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the device, relative to the endpoint's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRequest {
    pub method: HttpMethod,
    /// Absolute path, e.g. `/v1/FireTV`
    pub path: String,
    /// Query parameters, e.g. `action=DPAD_UP`
    pub query: Vec<(String, String)>,
    /// Optional JSON body
    pub body: Option<Value>,
}

impl DeviceRequest {
    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Builder pattern: add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Builder pattern: set the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let request = DeviceRequest::post("/v1/FireTV").with_query("action", "HOME");
        assert_eq!(request.to_string(), "POST /v1/FireTV?action=HOME");
        assert_eq!(DeviceRequest::get("/v1/media").to_string(), "GET /v1/media");
    }
}
