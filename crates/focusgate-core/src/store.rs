//! Persisted session flag.
//!
//! The detector consumes, never owns, one piece of persistent state: the
//! session's enabled flag, read once at startup and written on every
//! enable/disable request. `TomlSessionStore` keeps it under a fixed key in
//! a small TOML document at `~/.config/focusgate/session.toml`;
//! `MemorySessionStore` backs tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Configuration directory for this host, created if needed.
pub fn config_dir() -> Result<PathBuf, StoreError> {
    let dir = dirs::home_dir()
        .ok_or(StoreError::NoStorageDir)?
        .join(".config")
        .join("focusgate");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// External key-value store for the session's enabled flag.
pub trait SessionStore: Send {
    /// Read the flag. `Ok(None)` when nothing has been stored yet.
    fn load_enabled(&self) -> Result<Option<bool>, StoreError>;

    /// Write the flag.
    fn store_enabled(&mut self, enabled: bool) -> Result<(), StoreError>;
}

/// On-disk document holding the persisted session state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    enabled: Option<bool>,
}

/// File-backed session store.
pub struct TomlSessionStore {
    path: PathBuf,
}

impl TomlSessionStore {
    /// Store under the platform config directory, creating it if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self {
            path: config_dir()?.join("session.toml"),
        })
    }

    /// Store at an explicit path. The file need not exist yet.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_document(&self) -> Result<SessionDocument, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionDocument::default()),
            Err(e) => Err(StoreError::LoadFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl SessionStore for TomlSessionStore {
    fn load_enabled(&self) -> Result<Option<bool>, StoreError> {
        Ok(self.read_document()?.enabled)
    }

    fn store_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        // A corrupt document is overwritten rather than preserved.
        let mut doc = self.read_document().unwrap_or_default();
        doc.enabled = Some(enabled);
        let content = toml::to_string_pretty(&doc)?;
        std::fs::write(&self.path, content).map_err(|e| StoreError::SaveFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// In-memory store with a shared cell so tests can observe writes after
/// handing the store to the engine.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    cell: Arc<Mutex<Option<bool>>>,
}

impl MemorySessionStore {
    pub fn new(initial: Option<bool>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(initial)),
        }
    }

    /// Currently stored value.
    pub fn stored(&self) -> Option<bool> {
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load_enabled(&self) -> Result<Option<bool>, StoreError> {
        Ok(self.stored())
    }

    fn store_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner) = Some(enabled);
        Ok(())
    }
}
