//! Persistence hooks for the server registry.
//!
//! # Responsibilities
//! - Define the load/save contract used to persist server configs
//! - Provide an in-memory store and a JSON file store
//!
//! # Design Decisions
//! - The registry never touches the filesystem itself
//! - The file store writes `{version, lastUpdated, servers}` atomically
//!   (temp file + rename)
//! - A missing file loads as an empty list; bootstrap decides the defaults

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::manager::ServerRegistry;
use crate::registry::server::ServerConfig;

/// Current persisted document version.
pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode registry document: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Load/save hooks an external persistence layer implements.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<Vec<ServerConfig>, StoreError>;
    fn save(&self, servers: &[ServerConfig]) -> Result<(), StoreError>;
}

/// Persisted registry document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub servers: Vec<ServerConfig>,
}

impl RegistryDocument {
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            last_updated: Utc::now(),
            servers,
        }
    }
}

/// Store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RegistryStore for FileStore {
    fn load(&self) -> Result<Vec<ServerConfig>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Registry file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let document: RegistryDocument = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(
            path = %self.path.display(),
            version = %document.version,
            count = document.servers.len(),
            "Loaded server registry"
        );
        Ok(document.servers)
    }

    fn save(&self, servers: &[ServerConfig]) -> Result<(), StoreError> {
        let document = RegistryDocument::new(servers.to_vec());
        let encoded = serde_json::to_string_pretty(&document).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.path.display(), count = servers.len(), "Saved server registry");
        Ok(())
    }
}

/// Store that keeps the last saved set in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    servers: Mutex<Vec<ServerConfig>>,
}

impl MemoryStore {
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers: Mutex::new(servers),
        }
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<Vec<ServerConfig>, StoreError> {
        Ok(self.servers.lock().clone())
    }

    fn save(&self, servers: &[ServerConfig]) -> Result<(), StoreError> {
        *self.servers.lock() = servers.to_vec();
        Ok(())
    }
}

/// Persist the registry's current server set through `store`.
pub fn save_registry(registry: &ServerRegistry, store: &dyn RegistryStore) -> Result<(), StoreError> {
    store.save(&registry.export())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("models.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("models.json"));
        let servers = vec![
            ServerConfig::new("a", "http://a.local/v1", "m").with_priority(1),
            ServerConfig::new("b", "http://b.local/v1", "m").with_api_key("secret"),
        ];

        store.save(&servers).unwrap();
        assert_eq!(store.load().unwrap(), servers);

        let raw = fs::read_to_string(store.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], DOCUMENT_VERSION);
        assert!(doc.get("lastUpdated").is_some());
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, "{ not json").unwrap();
        let err = FileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn test_save_registry_through_memory_store() {
        let registry = ServerRegistry::with_servers(vec![ServerConfig::new("a", "http://a.local", "m")]);
        let store = MemoryStore::default();
        save_registry(&registry, &store).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
