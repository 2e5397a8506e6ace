//! Session facade coordinating pairing, translation and dispatch

use firebridge_auth::{PairingSession, PairingState, TokenManager, TokenStore};
use firebridge_client::{DeviceClient, DeviceError};
use firebridge_commands::{CommandCategory, CommandTranslator};
use firebridge_core::{BridgeConfig, CommandError, DeviceEndpoint, Result};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One logical session per configured device
pub struct Session {
    config: BridgeConfig,
    translator: CommandTranslator,
    tokens: TokenManager,
    /// Client for the paired device
    client: RwLock<Option<DeviceClient>>,
    last_activity: Mutex<Option<Instant>>,
}

impl Session {
    /// Create a session with no device paired yet, as used by setup flows
    pub fn new(store: Arc<dyn TokenStore>, config: BridgeConfig) -> Self {
        Self {
            tokens: TokenManager::new(store, config.clone()),
            translator: CommandTranslator::new(),
            config,
            client: RwLock::new(None),
            last_activity: Mutex::new(None),
        }
    }

    /// Open a session for a configured device, restoring its stored token
    pub async fn open(
        endpoint: DeviceEndpoint,
        store: Arc<dyn TokenStore>,
        config: BridgeConfig,
    ) -> Result<Self> {
        let session = Self::new(store, config);
        session.tokens.load(&endpoint).await?;
        session.bind(endpoint).await?;
        Ok(session)
    }

    /// Start pairing: the device displays a PIN for the user to read
    pub async fn authenticate(&self, endpoint: DeviceEndpoint) -> Result<PairingSession> {
        if self.config.wake_before_pairing {
            let client = DeviceClient::new(endpoint.clone(), &self.config)?;
            if client.wake().await {
                tokio::time::sleep(self.config.wake_settle()).await;
            }
        }

        Ok(self.tokens.request_pin(endpoint).await?)
    }

    /// Finish the outstanding pairing with the PIN shown on the TV
    pub async fn complete_authentication(&self, pin: &str) -> Result<()> {
        let session = self
            .tokens
            .pending_session()
            .await
            .ok_or(CommandError::PairingExpired)?;
        self.complete_authentication_with(&session, pin).await
    }

    /// Finish a specific pairing session
    pub async fn complete_authentication_with(
        &self,
        session: &PairingSession,
        pin: &str,
    ) -> Result<()> {
        self.tokens.verify_pin(session, pin).await?;
        self.bind(session.endpoint.clone()).await?;
        self.touch();
        Ok(())
    }

    /// Abandon an outstanding pairing; the displayed PIN becomes useless
    pub async fn cancel_pairing(&self) {
        self.tokens.cancel_pairing().await;
    }

    /// Translate `identifier` and send it to the device
    ///
    /// Malformed identifiers fail before any network I/O. A 401/403 drops the
    /// token and every later call fails with `NotAuthenticated` until pairing
    /// is run again.
    pub async fn send_command(&self, identifier: &str) -> Result<()> {
        let spec = self.translator.resolve(identifier)?;

        let token = self.tokens.current_token().await.ok_or_else(|| {
            CommandError::NotAuthenticated("no token, pairing required".to_string())
        })?;
        let client = self.client.read().await.clone().ok_or_else(|| {
            CommandError::NotAuthenticated("no device paired".to_string())
        })?;

        self.wake_if_idle(&client).await;

        let request = spec.to_request(&self.config.device_path);
        match client.request(&request, Some(token.value())).await {
            Ok(_) => {
                self.touch();
                if spec.category == CommandCategory::App {
                    info!("Launched {} on {}", spec.app_package().unwrap_or_default(), client.endpoint());
                } else {
                    debug!("Sent {} to {}", spec.identifier, client.endpoint());
                }
                Ok(())
            }
            Err(DeviceError::Unauthorized { status }) => {
                warn!(
                    "{} rejected the token (HTTP {}), pairing must be run again",
                    client.endpoint(),
                    status
                );
                if let Err(e) = self.tokens.invalidate_if(&token).await {
                    warn!("Failed to clear stored token, keeping it: {}", e);
                }
                Err(CommandError::NotAuthenticated(format!(
                    "device rejected the token (HTTP {})",
                    status
                )))
            }
            Err(e) => {
                warn!("{} failed: {}", spec.identifier, e);
                Err(e.into())
            }
        }
    }

    /// Check that the control API of `endpoint` answers, with a single attempt
    ///
    /// Meant for setup flows and startup, before pairing or commands.
    pub async fn check_reachable(&self, endpoint: &DeviceEndpoint) -> Result<()> {
        let client = DeviceClient::new(endpoint.clone(), &self.config)?;
        match client.check_reachable().await {
            Ok(()) => {
                info!("{} is reachable", endpoint);
                Ok(())
            }
            Err(e) => {
                warn!("{} is not reachable: {}", endpoint, e);
                Err(e.into())
            }
        }
    }

    /// Send a DIAL wake-up to the paired device
    pub async fn wake(&self) -> Result<bool> {
        let client = self.client.read().await.clone().ok_or_else(|| {
            CommandError::NotAuthenticated("no device paired".to_string())
        })?;
        Ok(client.wake().await)
    }

    /// Drop the token explicitly, e.g. when the host removes the device
    pub async fn forget(&self) -> Result<()> {
        Ok(self.tokens.invalidate().await?)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.current_token().await.is_some()
    }

    pub async fn state(&self) -> PairingState {
        self.tokens.state().await
    }

    /// Device this session sends commands to
    pub async fn endpoint(&self) -> Option<DeviceEndpoint> {
        self.client.read().await.as_ref().map(|c| c.endpoint().clone())
    }

    pub fn translator(&self) -> &CommandTranslator {
        &self.translator
    }

    async fn bind(&self, endpoint: DeviceEndpoint) -> Result<()> {
        let client = DeviceClient::new(endpoint, &self.config)?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    /// A sleeping Fire TV drops control connections; wake it after long idle
    async fn wake_if_idle(&self, client: &DeviceClient) {
        let Some(threshold) = self.config.idle_wake_after() else {
            return;
        };
        let idle = match self.last_activity.lock() {
            Ok(last) => last.map_or(true, |t| t.elapsed() > threshold),
            Err(_) => false,
        };
        if idle {
            info!("{} idle, sending wake-up before command", client.endpoint());
            if client.wake().await {
                tokio::time::sleep(self.config.wake_settle()).await;
            }
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firebridge_auth::{JsonTokenStorage, MemoryTokenStore};
    use firebridge_client::testing::{FakeDevice, FAKE_PIN};
    use serde_json::json;
    use std::time::Duration;

    fn test_config() -> BridgeConfig {
        BridgeConfig::new()
            .with_request_timeout(Duration::from_secs(2))
            .with_wake_before_pairing(false)
            .with_wake_settle(Duration::ZERO)
    }

    async fn paired_session(device: &FakeDevice) -> (Session, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        let session = Session::new(store.clone(), test_config());
        session.authenticate(device.endpoint()).await.unwrap();
        session.complete_authentication(FAKE_PIN).await.unwrap();
        (session, store)
    }

    #[tokio::test]
    async fn test_navigation_command() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;

        session.send_command("DPAD_DOWN").await.unwrap();

        let commands = device.command_requests();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].method, "POST");
        assert_eq!(commands[0].path, "/v1/FireTV");
        assert_eq!(commands[0].query.as_deref(), Some("action=DPAD_DOWN"));
    }

    #[tokio::test]
    async fn test_custom_app_command() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;

        session
            .send_command("custom_app:com.netflix.ninja")
            .await
            .unwrap();

        let commands = device.command_requests();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].path, "/v1/FireTV/app/com.netflix.ninja");
    }

    #[tokio::test]
    async fn test_media_scan_command() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;

        session.send_command("FAST_FORWARD").await.unwrap();

        let commands = device.command_requests();
        assert_eq!(commands[0].path, "/v1/media");
        assert_eq!(commands[0].query.as_deref(), Some("action=scan"));
        assert_eq!(commands[0].body.as_ref().unwrap()["direction"], json!("forward"));
    }

    #[tokio::test]
    async fn test_invalid_command_makes_no_request() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;
        let before = device.requests().len();

        let err = session
            .send_command("custom_app:bad package!")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidCommand("custom_app:bad package!".to_string())
        );
        assert_eq!(device.requests().len(), before);
    }

    #[tokio::test]
    async fn test_unpaired_session() {
        let device = FakeDevice::start().await;
        let session = Session::new(Arc::new(MemoryTokenStore::new()), test_config());

        let err = session.send_command("HOME").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));
        assert!(device.requests().is_empty());
        assert_eq!(session.state().await, PairingState::Unpaired);
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_without_retry() {
        let device = FakeDevice::start().await;
        let (session, store) = paired_session(&device).await;
        let identifier = device.endpoint().identifier();

        device.revoke_tokens();

        let err = session.send_command("HOME").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));
        assert!(!session.is_authenticated().await);
        let record = store.load(&identifier).await.unwrap().unwrap();
        assert!(record.token.is_none());

        let err = session.send_command("HOME").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));

        // Only the first call reached the device, and no pairing was attempted
        assert_eq!(device.command_requests().len(), 1);
        assert_eq!(device.pin_display_count(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_with_read_only_store() {
        let device = FakeDevice::start().await;
        let (session, store) = paired_session(&device).await;
        device.revoke_tokens();
        store.set_read_only(true);

        let err = session.send_command("HOME").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));
        // Memory still agrees with storage
        assert!(session.is_authenticated().await);

        store.set_read_only(false);
        let err = session.send_command("HOME").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));
        assert!(!session.is_authenticated().await);
        assert_eq!(device.command_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;
        device.revoke_tokens();

        let (a, b, c) = tokio::join!(
            session.send_command("DPAD_UP"),
            session.send_command("DPAD_UP"),
            session.send_command("DPAD_UP"),
        );
        for result in [a, b, c] {
            assert!(matches!(result, Err(CommandError::NotAuthenticated(_))));
        }
        assert_eq!(session.state().await, PairingState::Unpaired);

        // Explicit re-pairing restores service
        session.authenticate(device.endpoint()).await.unwrap();
        session.complete_authentication(FAKE_PIN).await.unwrap();
        session.send_command("DPAD_UP").await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_command_is_independent() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;

        session.send_command("SELECT").await.unwrap();
        session.send_command("SELECT").await.unwrap();

        let commands = device.command_requests();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], commands[1]);
        assert_eq!(session.state().await, PairingState::TokenIssued);
    }

    #[tokio::test]
    async fn test_rejected_app_keeps_token() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;
        device.uninstall("com.example.missing");

        let err = session
            .send_command("custom_app:com.example.missing")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::CommandRejected(_)));
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_unreachable_keeps_token() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;
        drop(device);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = session.send_command("HOME").await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_wrong_pin_changes_nothing() {
        let device = FakeDevice::start().await;
        let (session, store) = paired_session(&device).await;
        let identifier = device.endpoint().identifier();
        let before = store.load(&identifier).await.unwrap().unwrap().token;

        session.authenticate(device.endpoint()).await.unwrap();
        let err = session.complete_authentication("0000").await.unwrap_err();
        assert!(matches!(err, CommandError::NotAuthenticated(_)));

        let after = store.load(&identifier).await.unwrap().unwrap().token;
        assert_eq!(before, after);
        session.send_command("HOME").await.unwrap();
    }

    #[tokio::test]
    async fn test_pairing_expired() {
        let device = FakeDevice::start().await;
        let config = test_config().with_pin_validity(Duration::from_millis(50));
        let session = Session::new(Arc::new(MemoryTokenStore::new()), config);

        let pairing = session.authenticate(device.endpoint()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(
            session.complete_authentication(FAKE_PIN).await,
            Err(CommandError::PairingExpired)
        );
        assert_eq!(
            session.complete_authentication_with(&pairing, FAKE_PIN).await,
            Err(CommandError::PairingExpired)
        );
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_second_authenticate_replaces_first() {
        let device = FakeDevice::start().await;
        let session = Session::new(Arc::new(MemoryTokenStore::new()), test_config());

        let first = session.authenticate(device.endpoint()).await.unwrap();
        let _second = session.authenticate(device.endpoint()).await.unwrap();

        assert_eq!(
            session.complete_authentication_with(&first, FAKE_PIN).await,
            Err(CommandError::PairingExpired)
        );
        session.complete_authentication(FAKE_PIN).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_pairing() {
        let device = FakeDevice::start().await;
        let session = Session::new(Arc::new(MemoryTokenStore::new()), test_config());

        session.authenticate(device.endpoint()).await.unwrap();
        assert_eq!(session.state().await, PairingState::PinRequested);
        session.cancel_pairing().await;

        assert_eq!(
            session.complete_authentication(FAKE_PIN).await,
            Err(CommandError::PairingExpired)
        );
        assert_eq!(session.state().await, PairingState::Unpaired);
    }

    #[tokio::test]
    async fn test_token_survives_restart() {
        let device = FakeDevice::start().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        {
            let store = Arc::new(JsonTokenStorage::with_path(path.clone()).await.unwrap());
            let session = Session::new(store, test_config());
            session.authenticate(device.endpoint()).await.unwrap();
            session.complete_authentication(FAKE_PIN).await.unwrap();
        }

        let store = Arc::new(JsonTokenStorage::with_path(path).await.unwrap());
        let session = Session::open(device.endpoint(), store, test_config())
            .await
            .unwrap();
        assert!(session.is_authenticated().await);
        assert_eq!(session.endpoint().await, Some(device.endpoint()));
        session.send_command("BACK").await.unwrap();
        assert_eq!(device.pin_display_count(), 1);
    }

    #[tokio::test]
    async fn test_forget() {
        let device = FakeDevice::start().await;
        let (session, _store) = paired_session(&device).await;

        session.forget().await.unwrap();
        assert!(matches!(
            session.send_command("HOME").await,
            Err(CommandError::NotAuthenticated(_))
        ));
        assert!(device.command_requests().is_empty());
    }

    #[tokio::test]
    async fn test_wake_before_pairing() {
        let device = FakeDevice::start().await;
        let config = test_config().with_wake_before_pairing(true);
        let session = Session::new(Arc::new(MemoryTokenStore::new()), config);

        session.authenticate(device.endpoint()).await.unwrap();
        assert_eq!(device.wake_count(), 1);
        assert_eq!(device.pin_display_count(), 1);
    }

    #[tokio::test]
    async fn test_no_idle_wake_right_after_pairing() {
        let device = FakeDevice::start().await;
        let config = test_config().with_idle_wake_after(Some(Duration::from_secs(3600)));
        let session = Session::new(Arc::new(MemoryTokenStore::new()), config);
        session.authenticate(device.endpoint()).await.unwrap();
        session.complete_authentication(FAKE_PIN).await.unwrap();

        session.send_command("HOME").await.unwrap();
        session.send_command("HOME").await.unwrap();

        assert_eq!(device.wake_count(), 0);
        assert_eq!(device.command_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_idle_wake_after_threshold() {
        let device = FakeDevice::start().await;
        let config = test_config().with_idle_wake_after(Some(Duration::from_millis(100)));
        let session = Session::new(Arc::new(MemoryTokenStore::new()), config);
        session.authenticate(device.endpoint()).await.unwrap();
        session.complete_authentication(FAKE_PIN).await.unwrap();

        session.send_command("HOME").await.unwrap();
        assert_eq!(device.wake_count(), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        session.send_command("HOME").await.unwrap();
        assert_eq!(device.wake_count(), 1);
        assert_eq!(device.command_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_restored_session_wakes_before_first_command() {
        let device = FakeDevice::start().await;
        let store = Arc::new(MemoryTokenStore::new());
        {
            let session = Session::new(store.clone(), test_config());
            session.authenticate(device.endpoint()).await.unwrap();
            session.complete_authentication(FAKE_PIN).await.unwrap();
        }

        let config = test_config().with_idle_wake_after(Some(Duration::from_secs(3600)));
        let session = Session::open(device.endpoint(), store, config).await.unwrap();
        session.send_command("HOME").await.unwrap();
        session.send_command("HOME").await.unwrap();

        assert_eq!(device.wake_count(), 1);
    }

    #[tokio::test]
    async fn test_check_reachable() {
        let device = FakeDevice::start().await;
        let session = Session::new(Arc::new(MemoryTokenStore::new()), test_config());

        session.check_reachable(&device.endpoint()).await.unwrap();
        assert_eq!(device.requests().len(), 1);
        assert_eq!(device.pin_display_count(), 0);
        assert_eq!(session.state().await, PairingState::Unpaired);

        let endpoint = device.endpoint();
        drop(device);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = session.check_reachable(&endpoint).await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
