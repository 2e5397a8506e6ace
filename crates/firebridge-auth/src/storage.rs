//! Persistent storage for device tokens
//!
//! One [`DeviceRecord`] per configured device. The default backend is a JSON
//! file in ~/.config/firebridge/devices.json.

use crate::token::AuthToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firebridge_core::{CommandError, DeviceEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Device not found: {0}")]
    NotFound(String),
    #[error("Configuration directory not found")]
    NoConfigDir,
    #[error("Storage is read-only")]
    ReadOnly,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        CommandError::Storage(err.to_string())
    }
}

/// Persisted state of one configured device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Storage key, see [`DeviceEndpoint::identifier`]
    pub identifier: String,
    /// Human-readable name
    pub name: String,
    pub endpoint: DeviceEndpoint,
    /// Absent after invalidation
    pub token: Option<AuthToken>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Create a record for a freshly paired device
    pub fn new(endpoint: DeviceEndpoint, token: AuthToken) -> Self {
        Self {
            identifier: endpoint.identifier(),
            name: format!("Fire TV ({})", endpoint.host),
            endpoint,
            token: Some(token),
            updated_at: Utc::now(),
        }
    }

    /// Builder pattern: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Configuration storage collaborator for tokens
///
/// Injected into the token manager so tokens survive restarts without the
/// manager knowing where they live.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the record of one device
    async fn load(&self, identifier: &str) -> StorageResult<Option<DeviceRecord>>;

    /// Insert or replace a record
    async fn save(&self, record: DeviceRecord) -> StorageResult<()>;

    /// Drop the token of a device, keeping its record
    async fn clear_token(&self, identifier: &str) -> StorageResult<()>;

    /// Remove a device entirely
    async fn remove(&self, identifier: &str) -> StorageResult<()>;

    /// All configured devices
    async fn list(&self) -> StorageResult<Vec<DeviceRecord>>;
}

/// Stored data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredData {
    /// Devices indexed by identifier
    devices: HashMap<String, DeviceRecord>,
}

/// JSON file backed token storage
pub struct JsonTokenStorage {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory copy of the file
    data: Arc<RwLock<StoredData>>,
}

impl JsonTokenStorage {
    /// Open the storage at the default path
    ///
    /// Loads existing data from disk if present.
    pub async fn new() -> StorageResult<Self> {
        let path = Self::default_path()?;
        Self::with_path(path).await
    }

    /// Open the storage at a specific path
    pub async fn with_path(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => {
                    info!("Loaded token storage from {:?}", path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse token storage, starting fresh: {}", e);
                    StoredData::default()
                }
            }
        } else {
            debug!("No existing token storage, creating new");
            StoredData::default()
        };

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Get the default storage path (~/.config/firebridge/devices.json)
    pub fn default_path() -> StorageResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(config_dir.join("firebridge").join("devices.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Write the given state to disk
    ///
    /// Written to a sibling file and renamed so a crash never leaves a
    /// truncated file behind.
    fn persist(&self, data: &StoredData) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved token storage to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for JsonTokenStorage {
    async fn load(&self, identifier: &str) -> StorageResult<Option<DeviceRecord>> {
        let data = self.data.read().await;
        Ok(data.devices.get(identifier).cloned())
    }

    async fn save(&self, record: DeviceRecord) -> StorageResult<()> {
        let identifier = record.identifier.clone();
        let mut data = self.data.write().await;
        let mut updated = data.clone();
        updated.devices.insert(identifier.clone(), record);
        self.persist(&updated)?;
        *data = updated;
        info!("Saved device {}", identifier);
        Ok(())
    }

    async fn clear_token(&self, identifier: &str) -> StorageResult<()> {
        let mut data = self.data.write().await;
        let mut updated = data.clone();
        let record = updated
            .devices
            .get_mut(identifier)
            .ok_or_else(|| StorageError::NotFound(identifier.to_string()))?;
        record.token = None;
        record.updated_at = Utc::now();
        self.persist(&updated)?;
        *data = updated;
        info!("Cleared token of device {}", identifier);
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> StorageResult<()> {
        let mut data = self.data.write().await;
        let mut updated = data.clone();
        if updated.devices.remove(identifier).is_none() {
            return Err(StorageError::NotFound(identifier.to_string()));
        }
        self.persist(&updated)?;
        *data = updated;
        info!("Removed device {}", identifier);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<DeviceRecord>> {
        let data = self.data.read().await;
        Ok(data.devices.values().cloned().collect())
    }
}

/// In-memory token storage, for tests and hosts that persist elsewhere
#[derive(Default)]
pub struct MemoryTokenStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
    read_only: AtomicBool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with [`StorageError::ReadOnly`]
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, identifier: &str) -> StorageResult<Option<DeviceRecord>> {
        Ok(self.devices.read().await.get(identifier).cloned())
    }

    async fn save(&self, record: DeviceRecord) -> StorageResult<()> {
        self.check_writable()?;
        self.devices
            .write()
            .await
            .insert(record.identifier.clone(), record);
        Ok(())
    }

    async fn clear_token(&self, identifier: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut devices = self.devices.write().await;
        let record = devices
            .get_mut(identifier)
            .ok_or_else(|| StorageError::NotFound(identifier.to_string()))?;
        record.token = None;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.devices
            .write()
            .await
            .remove(identifier)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(identifier.to_string()))
    }

    async fn list(&self) -> StorageResult<Vec<DeviceRecord>> {
        Ok(self.devices.read().await.values().cloned().collect())
    }
}
