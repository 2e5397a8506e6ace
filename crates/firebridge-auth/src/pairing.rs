//! Fire TV pairing with PIN verification
//!
//! Implements the device's pairing flow:
//! 1. Ask the TV to display a 4-digit PIN, valid for 60 seconds
//! 2. The user reads the PIN off the screen
//! 3. The PIN is verified and the device issues a token
//! 4. The token is persisted, then used for every command

use crate::storage::{DeviceRecord, StorageError, TokenStore};
use crate::token::AuthToken;
use chrono::{DateTime, Duration, Utc};
use firebridge_client::{DeviceClient, DeviceError};
use firebridge_core::{BridgeConfig, CommandError, DeviceEndpoint, DeviceRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pairing errors
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("PIN entry window expired")]
    Expired,
    #[error("Pairing session was replaced by a newer one")]
    SessionMismatch,
    #[error("No pairing in progress")]
    NoSession,
    #[error("PIN must be digits only")]
    MalformedPin,
    #[error("PIN rejected by device (HTTP {0})")]
    PinRejected(u16),
    #[error("Device returned no token")]
    MissingToken,
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type PairingResult<T> = Result<T, PairingError>;

impl From<PairingError> for CommandError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::Expired | PairingError::SessionMismatch | PairingError::NoSession => {
                CommandError::PairingExpired
            }
            PairingError::MalformedPin
            | PairingError::PinRejected(_)
            | PairingError::MissingToken => CommandError::NotAuthenticated(err.to_string()),
            PairingError::Device(e) => e.into(),
            PairingError::Storage(e) => e.into(),
        }
    }
}

/// Pairing lifecycle of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    Unpaired,
    PinRequested,
    TokenIssued,
}

/// A PIN display awaiting verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingSession {
    /// Device showing the PIN
    pub endpoint: DeviceEndpoint,
    /// Identifies this PIN request
    pub pin_request_id: String,
    /// When the PIN stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl PairingSession {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole seconds left in the PIN window
    pub fn remaining_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[derive(Debug, Default)]
struct Credentials {
    endpoint: Option<DeviceEndpoint>,
    token: Option<AuthToken>,
}

/// Owns the pairing flow and the token it produces
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    config: BridgeConfig,
    /// Single point of mutation for the token
    credentials: RwLock<Credentials>,
    /// At most one outstanding PIN display
    pending: Mutex<Option<PairingSession>>,
}

impl TokenManager {
    /// Create a manager with no device bound yet
    pub fn new(store: Arc<dyn TokenStore>, config: BridgeConfig) -> Self {
        Self {
            store,
            config,
            credentials: RwLock::new(Credentials::default()),
            pending: Mutex::new(None),
        }
    }

    /// Bind to a device and restore its persisted token, if any
    pub async fn load(&self, endpoint: &DeviceEndpoint) -> PairingResult<Option<AuthToken>> {
        let record = self.store.load(&endpoint.identifier()).await?;
        let token = record.and_then(|r| r.token);

        let mut credentials = self.credentials.write().await;
        credentials.endpoint = Some(endpoint.clone());
        credentials.token = token.clone();

        match &token {
            Some(t) => info!("Restored token {} for {}", t.masked(), endpoint),
            None => info!("No stored token for {}, pairing required", endpoint),
        }
        Ok(token)
    }

    /// Ask the device to display a PIN
    ///
    /// Replaces any outstanding session; verifying the old one fails from now on.
    pub async fn request_pin(&self, endpoint: DeviceEndpoint) -> PairingResult<PairingSession> {
        let client = DeviceClient::new(endpoint.clone(), &self.config)?;
        let request = DeviceRequest::post(format!("/v1/{}/pin/display", self.config.device_path))
            .with_body(json!({ "friendlyName": self.config.friendly_name }));

        info!("Requesting PIN display on {}", endpoint);
        let body = client
            .request_with_timeout(&request, None, self.config.pairing_timeout())
            .await?;

        let pin_request_id = body
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = PairingSession {
            endpoint,
            pin_request_id,
            expires_at: Utc::now() + Duration::milliseconds(self.config.pin_validity_ms as i64),
        };

        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            debug!("Replacing outstanding pairing session");
        }
        *pending = Some(session.clone());

        info!("PIN displayed, valid for {}s", session.remaining_seconds());
        Ok(session)
    }

    /// Verify the PIN shown for `session` and obtain a token
    ///
    /// The token is persisted before it is installed and returned. A rejected
    /// PIN changes nothing and keeps the session open for another attempt.
    pub async fn verify_pin(&self, session: &PairingSession, pin: &str) -> PairingResult<AuthToken> {
        if session.is_expired() {
            warn!("PIN entered after the pairing window closed");
            self.drop_pending(session).await;
            return Err(PairingError::Expired);
        }

        {
            let pending = self.pending.lock().await;
            match pending.as_ref() {
                None => return Err(PairingError::NoSession),
                Some(current) if current != session => return Err(PairingError::SessionMismatch),
                Some(_) => {}
            }
        }

        let pin = pin.trim();
        if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(PairingError::MalformedPin);
        }

        let client = DeviceClient::new(session.endpoint.clone(), &self.config)?;
        let request = DeviceRequest::post(format!("/v1/{}/pin/verify", self.config.device_path))
            .with_body(json!({ "pin": pin }));

        let body = match client.request(&request, None).await {
            Ok(body) => body,
            Err(DeviceError::Unauthorized { status }) | Err(DeviceError::Rejected { status, .. }) => {
                warn!("PIN rejected by {} (HTTP {})", session.endpoint, status);
                return Err(PairingError::PinRejected(status));
            }
            Err(e) => return Err(e.into()),
        };

        let token = extract_token(&body)
            .map(AuthToken::new)
            .ok_or(PairingError::MissingToken)?;

        // Hold the session lock until the token is installed so a concurrent
        // request_pin cannot interleave.
        let mut pending = self.pending.lock().await;
        if pending.as_ref() != Some(session) {
            return Err(PairingError::SessionMismatch);
        }

        let identifier = session.endpoint.identifier();
        let name = self
            .store
            .load(&identifier)
            .await?
            .map(|r| r.name);
        let mut record = DeviceRecord::new(session.endpoint.clone(), token.clone());
        if let Some(name) = name {
            record = record.with_name(name);
        }
        self.store.save(record).await?;

        {
            let mut credentials = self.credentials.write().await;
            credentials.endpoint = Some(session.endpoint.clone());
            credentials.token = Some(token.clone());
        }
        *pending = None;

        info!("Paired with {}, token {}", session.endpoint, token.masked());
        Ok(token)
    }

    /// The outstanding pairing session, if still inside its window
    pub async fn pending_session(&self) -> Option<PairingSession> {
        self.pending
            .lock()
            .await
            .as_ref()
            .filter(|s| !s.is_expired())
            .cloned()
    }

    /// Abandon the outstanding pairing session
    pub async fn cancel_pairing(&self) {
        if self.pending.lock().await.take().is_some() {
            debug!("Pairing session cancelled");
        }
    }

    /// Current token, without network I/O
    pub async fn current_token(&self) -> Option<AuthToken> {
        self.credentials.read().await.token.clone()
    }

    /// Device the current token belongs to
    pub async fn current_endpoint(&self) -> Option<DeviceEndpoint> {
        self.credentials.read().await.endpoint.clone()
    }

    pub async fn state(&self) -> PairingState {
        if self.pending_session().await.is_some() {
            PairingState::PinRequested
        } else if self.current_token().await.is_some() {
            PairingState::TokenIssued
        } else {
            PairingState::Unpaired
        }
    }

    /// Drop the token from storage, then from memory
    ///
    /// On a storage failure the token is kept in both places.
    pub async fn invalidate(&self) -> PairingResult<()> {
        let mut credentials = self.credentials.write().await;
        if credentials.token.is_none() {
            return Ok(());
        }
        self.clear_persisted(credentials.endpoint.as_ref()).await?;
        credentials.token = None;
        warn!("Token invalidated");
        Ok(())
    }

    /// Drop the token only if it is still `rejected`
    ///
    /// Returns whether it was dropped. Concurrent callers holding the same
    /// rejected token invalidate once, and a token installed by a newer
    /// pairing is left alone. If storage cannot be updated the token stays
    /// installed, and the next 401 tries again.
    pub async fn invalidate_if(&self, rejected: &AuthToken) -> PairingResult<bool> {
        let mut credentials = self.credentials.write().await;
        if credentials.token.as_ref() != Some(rejected) {
            debug!("Token already replaced or invalidated");
            return Ok(false);
        }
        self.clear_persisted(credentials.endpoint.as_ref()).await?;
        credentials.token = None;
        warn!("Token {} rejected by device, invalidated", rejected.masked());
        Ok(true)
    }

    async fn clear_persisted(&self, endpoint: Option<&DeviceEndpoint>) -> PairingResult<()> {
        let Some(endpoint) = endpoint else {
            return Ok(());
        };
        match self.store.clear_token(&endpoint.identifier()).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_pending(&self, session: &PairingSession) {
        let mut pending = self.pending.lock().await;
        if pending.as_ref() == Some(session) {
            *pending = None;
        }
    }
}

/// Token from a verify response; real devices put it in `description`
fn extract_token(body: &Value) -> Option<String> {
    ["token", "description"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
