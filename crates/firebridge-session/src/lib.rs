//! FireBridge Session - the host-facing entry point
//!
//! A [`Session`] is what a host integration holds per configured Fire TV. It
//! runs pairing on request and turns command identifiers into device calls:
//!
//! ```no_run
//! use firebridge_auth::MemoryTokenStore;
//! use firebridge_core::{BridgeConfig, DeviceEndpoint};
//! use firebridge_session::Session;
//! use std::sync::Arc;
//!
//! async fn example() -> firebridge_core::Result<()> {
//!     let session = Session::new(Arc::new(MemoryTokenStore::new()), BridgeConfig::default());
//!
//!     session.authenticate(DeviceEndpoint::new("192.168.1.20", 8080)).await?;
//!     session.complete_authentication("1234").await?;
//!
//!     session.send_command("DPAD_DOWN").await?;
//!     session.send_command("custom_app:com.netflix.ninja").await?;
//!     Ok(())
//! }
//! ```
//!
//! Every failure is one of the [`CommandError`](firebridge_core::CommandError)
//! kinds. A rejected token is dropped and reported as `NotAuthenticated`; the
//! session never re-pairs on its own because pairing needs a person to read
//! the PIN off the TV.

mod session;

pub use firebridge_auth::{PairingSession, PairingState};
pub use session::Session;
