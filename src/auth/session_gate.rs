use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::ServiceError;

/// Storage key holding the session flag.
pub const SESSION_KEY: &str = "site_auth";
const SESSION_VALUE: &str = "true";
const SESSION_FILE_NAME: &str = "production-tracker-session.json";

/// Session-scoped key/value storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError>;
    fn remove(&self, key: &str) -> Result<(), ServiceError>;
}

/// Storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ServiceError> {
        self.entries
            .lock()
            .map_err(|_| ServiceError::StorageError("session storage lock poisoned".to_string()))
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ServiceError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// JSON object on disk; by default in the system temp directory so it goes
/// away with the login session.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(SESSION_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, ServiceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            ServiceError::StorageError(format!(
                "failed to parse session file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), ServiceError> {
        if entries.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}

impl Default for FileSessionStorage {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let mut entries = self.read()?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), ServiceError> {
        let mut entries = self.read()?;
        if entries.remove(key).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of `password`.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Remembers, for the session, that the shared password was entered.
#[derive(Clone)]
pub struct SessionGate {
    storage: Arc<dyn SessionStorage>,
    password_sha256: Option<String>,
}

impl SessionGate {
    /// `password_sha256` of `None` leaves the gate open.
    pub fn new(storage: Arc<dyn SessionStorage>, password_sha256: Option<String>) -> Self {
        Self {
            storage,
            password_sha256: password_sha256.map(|d| d.trim().to_ascii_lowercase()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.password_sha256.is_none()
    }

    pub fn is_authenticated(&self) -> Result<bool, ServiceError> {
        if self.is_open() {
            return Ok(true);
        }
        Ok(self.storage.get(SESSION_KEY)?.as_deref() == Some(SESSION_VALUE))
    }

    /// Fails with `Unauthorized` unless the session is authenticated.
    pub fn require(&self) -> Result<(), ServiceError> {
        if self.is_authenticated()? {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(
                "not signed in; run `login` first".to_string(),
            ))
        }
    }

    pub fn sign_in(&self, password: &str) -> Result<(), ServiceError> {
        if let Some(expected) = &self.password_sha256 {
            if password_digest(password) != *expected {
                warn!("rejected sign-in with incorrect password");
                return Err(ServiceError::Unauthorized("incorrect password".to_string()));
            }
        }
        self.storage.set(SESSION_KEY, SESSION_VALUE)?;
        info!("session signed in");
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), ServiceError> {
        self.storage.remove(SESSION_KEY)?;
        debug!("session signed out");
        Ok(())
    }
}
