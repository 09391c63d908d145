//! Core error types for focusgate-core.
//!
//! This module defines the error hierarchy using thiserror. Most failures in
//! this subsystem are recovered in place (a missing signal is data, not an
//! error); these types cover the boundaries that genuinely fail: the
//! presentation layer and the session store.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for focusgate-core.
#[derive(Error, Debug)]
pub enum DetectorError {
    /// Blocking-surface presentation errors
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Session store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the externally owned blocking surface.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The presentation layer could not be created or attached
    #[error("Failed to create blocking surface: {0}")]
    CreationFailed(String),

    /// The host revoked the capability the surface needs
    #[error("Blocking surface permission unavailable: {0}")]
    PermissionUnavailable(String),
}

/// Errors raised by the persisted session-flag store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the stored session document
    #[error("Failed to load session state from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to write the stored session document
    #[error("Failed to save session state to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// The stored document did not parse
    #[error("Failed to parse session state: {0}")]
    ParseFailed(String),

    /// No usable storage location on this host
    #[error("No configuration directory available")]
    NoStorageDir,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ParseFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ParseFailed(err.to_string())
    }
}

/// Result type alias for DetectorError
pub type Result<T, E = DetectorError> = std::result::Result<T, E>;
