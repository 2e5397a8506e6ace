//! In-process fake Fire TV for tests
//!
//! Serves the same paths as the real control API on a loopback port, records
//! every request, and lets a test revoke tokens, uninstall apps or inject
//! failures.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use firebridge_core::DeviceEndpoint;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// PIN the fake device "displays" unless changed
pub const FAKE_PIN: &str = "1234";

/// A request as seen by the fake device
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub client_token: Option<String>,
    pub api_key: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Whether this was a command (not pairing, not wake-up)
    pub fn is_command(&self) -> bool {
        self.path.starts_with("/v1/") && !self.path.contains("/pin/")
    }
}

#[derive(Debug, Default)]
struct FakeState {
    pin: String,
    valid_tokens: HashSet<String>,
    issued: u32,
    pin_displays: u32,
    wakes: u32,
    missing_apps: HashSet<String>,
    fail_next: Option<u16>,
    stall_next: Option<Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<FakeState>>;

/// Fake device bound to `127.0.0.1:<random port>`
pub struct FakeDevice {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeDevice {
    /// Start the fake device on a random loopback port
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            pin: FAKE_PIN.to_string(),
            ..Default::default()
        }));

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake device");
        let addr = listener.local_addr().expect("fake device address");

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    /// Endpoint pointing at this fake, wake-up port included
    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new("127.0.0.1", self.addr.port()).with_wake_port(self.addr.port())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake device state")
    }

    /// Issue a valid token as if pairing had already happened
    pub fn issue_token(&self) -> String {
        issue(&mut self.state())
    }

    /// Invalidate every issued token, as when pairing is removed on the TV
    pub fn revoke_tokens(&self) {
        self.state().valid_tokens.clear();
    }

    pub fn set_pin(&self, pin: &str) {
        self.state().pin = pin.to_string();
    }

    /// Make app launches for this package answer 404
    pub fn uninstall(&self, package: &str) {
        self.state().missing_apps.insert(package.to_string());
    }

    /// Answer the next request with this status
    pub fn fail_next(&self, status: u16) {
        self.state().fail_next = Some(status);
    }

    /// Delay the next response
    pub fn stall_next(&self, delay: Duration) {
        self.state().stall_next = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn command_requests(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.is_command()).collect()
    }

    pub fn pin_display_count(&self) -> u32 {
        self.state().pin_displays
    }

    pub fn wake_count(&self) -> u32 {
        self.state().wakes
    }

    pub fn is_token_valid(&self, token: &str) -> bool {
        self.state().valid_tokens.contains(token)
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn issue(state: &mut FakeState) -> String {
    state.issued += 1;
    let token = format!("fake-token-{}", state.issued);
    state.valid_tokens.insert(token.clone());
    token
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn describe(status: StatusCode, description: &str) -> Response {
    (status, Json(json!({ "description": description }))).into_response()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let record = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header_value(&headers, header::AUTHORIZATION.as_str()),
        client_token: header_value(&headers, "x-client-token"),
        api_key: header_value(&headers, "x-api-key"),
        body: serde_json::from_slice(&body).ok(),
    };

    let stall = {
        let mut s = state.lock().expect("fake device state");
        s.requests.push(record.clone());
        s.stall_next.take()
    };
    if let Some(delay) = stall {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock().expect("fake device state");

    if let Some(status) = s.fail_next.take() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return describe(status, "injected failure");
    }

    let path = record.path.as_str();

    if path == "/apps/FireTVRemote" {
        s.wakes += 1;
        return StatusCode::CREATED.into_response();
    }

    if path == "/v1/FireTV/pin/display" {
        s.pin_displays += 1;
        let request_id = format!("pin-request-{}", s.pin_displays);
        return (
            StatusCode::OK,
            Json(json!({ "description": "OK", "requestId": request_id })),
        )
            .into_response();
    }

    if path == "/v1/FireTV/pin/verify" {
        let pin = record
            .body
            .as_ref()
            .and_then(|b| b.get("pin"))
            .and_then(Value::as_str);
        if pin == Some(s.pin.as_str()) {
            let token = issue(&mut s);
            return describe(StatusCode::OK, &token);
        }
        return describe(StatusCode::BAD_REQUEST, "Invalid PIN");
    }

    let bearer = record
        .authorization
        .as_deref()
        .and_then(|a| a.strip_prefix("Bearer "));
    if !bearer.is_some_and(|t| s.valid_tokens.contains(t)) {
        return describe(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match path {
        "/v1/FireTV" | "/v1/media" if record.query.is_some() => StatusCode::OK.into_response(),
        _ => match path.strip_prefix("/v1/FireTV/app/") {
            Some(package) if s.missing_apps.contains(package) => {
                describe(StatusCode::NOT_FOUND, "Package not found")
            }
            Some(_) => StatusCode::OK.into_response(),
            None => describe(StatusCode::NOT_FOUND, "Unknown endpoint"),
        },
    }
}
