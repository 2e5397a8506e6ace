//! Device HTTP client

use crate::error::{DeviceError, DeviceResult};
use firebridge_core::{BridgeConfig, DeviceEndpoint, DeviceRequest, HttpMethod};
use reqwest::{header, Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// User agent of the official Fire TV remote app; some firmware checks it
pub const USER_AGENT: &str = "okhttp/4.10.0";

const API_KEY_HEADER: &str = "X-Api-Key";
const CLIENT_TOKEN_HEADER: &str = "X-Client-Token";
const WAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Statuses showing the control API is up, even if it refused the request
const REACHABLE_STATUSES: [u16; 5] = [200, 400, 401, 404, 405];

/// HTTP client bound to one device endpoint
#[derive(Debug, Clone)]
pub struct DeviceClient {
    endpoint: DeviceEndpoint,
    base_url: String,
    http: Client,
    api_key: String,
    device_path: String,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a client for the given endpoint
    ///
    /// Fire TV devices serve a self-signed certificate on the control port, so
    /// certificate verification is disabled.
    pub fn new(endpoint: DeviceEndpoint, config: &BridgeConfig) -> DeviceResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(USER_AGENT)
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| DeviceError::Client(e.to_string()))?;

        Ok(Self {
            base_url: endpoint.base_url(),
            endpoint,
            http,
            api_key: config.api_key.clone(),
            device_path: config.device_path.clone(),
            timeout: config.request_timeout(),
        })
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Issue a request with the default timeout
    ///
    /// The token is attached as a bearer token when present; pairing calls
    /// pass `None`.
    pub async fn request(&self, request: &DeviceRequest, token: Option<&str>) -> DeviceResult<Value> {
        self.request_with_timeout(request, token, self.timeout).await
    }

    /// Issue a request with an explicit timeout
    pub async fn request_with_timeout(
        &self,
        request: &DeviceRequest,
        token: Option<&str>,
        timeout: Duration,
    ) -> DeviceResult<Value> {
        debug!("{} -> {}", request, self.endpoint);

        let response = match self.send_once(request, token, timeout).await {
            Ok(response) => response,
            Err(e) if is_connection_failure(&e) => {
                warn!("Connection to {} failed ({}), retrying once", self.endpoint, e);
                self.send_once(request, token, timeout)
                    .await
                    .map_err(|e| DeviceError::from_transport(&e))?
            }
            Err(e) => return Err(DeviceError::from_transport(&e)),
        };

        classify(response).await
    }

    /// Check that the control API answers at all
    ///
    /// One unauthenticated request, no retry. Any of the statuses a live API
    /// gives an anonymous caller (200, 400, 401, 404, 405) counts as
    /// reachable; another status is [`DeviceError::Rejected`] and a transport
    /// failure is [`DeviceError::Unreachable`].
    pub async fn check_reachable(&self) -> DeviceResult<()> {
        let request = DeviceRequest::get(format!("/v1/{}", self.device_path));
        debug!("Checking {} is reachable", self.endpoint);

        let response = self
            .send_once(&request, None, self.timeout)
            .await
            .map_err(|e| DeviceError::from_transport(&e))?;

        let status = response.status().as_u16();
        if REACHABLE_STATUSES.contains(&status) {
            debug!("{} reachable (HTTP {})", self.endpoint, status);
            return Ok(());
        }

        warn!("{} answered the reachability check with HTTP {}", self.endpoint, status);
        match classify(response).await {
            Err(e) => Err(e),
            Ok(_) => Err(DeviceError::Rejected {
                status,
                message: "unexpected status".to_string(),
            }),
        }
    }

    /// Send a DIAL wake-up to the device
    ///
    /// Best effort: a sleeping device may not answer at all, and an awake one
    /// may answer with any status. Returns whether the device responded.
    pub async fn wake(&self) -> bool {
        let url = self.endpoint.wake_url();
        debug!("Sending wake-up to {}", url);

        let result = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CONTENT_LENGTH, "0")
            .timeout(WAKE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => {
                debug!("Wake-up answered with {}", response.status());
                true
            }
            Err(e) => {
                debug!("Wake-up got no answer (device may already be awake): {}", e);
                false
            }
        }
    }

    async fn send_once(
        &self,
        request: &DeviceRequest,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        };

        builder = builder
            .timeout(timeout)
            .header(API_KEY_HEADER, &self.api_key);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(token) = token {
            builder = builder
                .bearer_auth(token)
                .header(CLIENT_TOKEN_HEADER, token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await
    }
}

/// Map an HTTP response to the device error taxonomy
async fn classify(response: Response) -> DeviceResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| DeviceError::from_transport(&e))?;

    if status.is_success() {
        return Ok(parse_body(&text));
    }

    match status.as_u16() {
        401 | 403 => Err(DeviceError::Unauthorized {
            status: status.as_u16(),
        }),
        code => {
            let message = device_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            Err(DeviceError::Rejected {
                status: code,
                message,
            })
        }
    }
}

fn parse_body(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Extract the device's own explanation from an error body
fn device_message(text: &str) -> Option<String> {
    match parse_body(text) {
        Value::Object(map) => ["description", "message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Connect failures and dropped connections, but never timeouts
fn is_connection_failure(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return false;
    }
    if err.is_connect() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
