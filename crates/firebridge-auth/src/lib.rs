//! FireBridge Auth - Fire TV pairing and token lifecycle
//!
//! Obtains and keeps the token the Fire TV control API requires.
//!
//! # Pairing Flow
//!
//! 1. `TokenManager::request_pin()` asks the TV to display a 4-digit PIN
//! 2. The user reads the PIN off the TV screen
//! 3. `TokenManager::verify_pin()` exchanges it for a token within 60 seconds
//! 4. The token is persisted through a [`TokenStore`] before it is used
//! 5. A later 401/403 from the device invalidates it; pairing is run again
//!
//! # Example
//!
//! ```no_run
//! use firebridge_auth::{JsonTokenStorage, TokenManager};
//! use firebridge_core::{BridgeConfig, DeviceEndpoint};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let store = Arc::new(JsonTokenStorage::new().await.unwrap());
//!     let manager = TokenManager::new(store, BridgeConfig::default());
//!
//!     let session = manager
//!         .request_pin(DeviceEndpoint::new("192.168.1.20", 8080))
//!         .await
//!         .unwrap();
//!     let token = manager.verify_pin(&session, "1234").await.unwrap();
//!     println!("Paired, token issued at {}", token.issued_at());
//! }
//! ```

pub mod pairing;
pub mod storage;
pub mod token;

pub use pairing::{PairingError, PairingResult, PairingSession, PairingState, TokenManager};
pub use storage::{
    DeviceRecord, JsonTokenStorage, MemoryTokenStore, StorageError, StorageResult, TokenStore,
};
pub use token::AuthToken;
