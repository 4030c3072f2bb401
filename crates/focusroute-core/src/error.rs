//! Core error types for focusroute-core.
//!
//! This module defines the error hierarchy used across the library:
//! validation failures are handled locally by callers, collaborator
//! failures end the current planning run, and linkage store failures are
//! downgraded to warnings inside a run.

use std::path::PathBuf;
use thiserror::Error;

use crate::scheduler::PlacedBlock;

/// Core error type for focusroute-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Linkage store errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An external collaborator (calendar, mail, to-do list, LLM) failed
    #[error("Collaborator '{service}' unavailable: {message}")]
    Collaborator {
        service: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a collaborator failure without an underlying cause.
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Collaborator {
            service: service.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Build a collaborator failure wrapping the underlying cause.
    pub fn collaborator_with<E>(service: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoreError::Collaborator {
            service: service.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// Linkage store errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The directory holding the database could not be prepared
    #[error("Data directory unavailable: {source}")]
    DataDirUnavailable {
        #[source]
        source: std::io::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The in-process lock guarding the connection was poisoned
    #[error("Database lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Invalid callback
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Not authenticated
    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    /// Credentials not configured
    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// OS keyring failure
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Interval whose end is not after its start
    #[error("Invalid interval: end ({end}) must be after start ({start})")]
    InvalidInterval { start: String, end: String },

    /// Task that cannot be scheduled even after normalization
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Local wall-clock time that does not exist (or is ambiguous) in the zone
    #[error("Local time {local} does not exist in {timezone}")]
    NonexistentLocalTime { local: String, timezone: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// A planning run that ended early because a collaborator failed.
///
/// Blocks created before the failure stay on the calendar and are reported
/// here.
#[derive(Error, Debug)]
#[error("planning run failed after {} placed block(s): {source}", .placed.len())]
pub struct RunError {
    pub placed: Vec<PlacedBlock>,
    #[source]
    pub source: CoreError,
}

impl RunError {
    /// Failure before anything was placed.
    pub fn before_placement(source: impl Into<CoreError>) -> Self {
        Self {
            placed: Vec::new(),
            source: source.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<keyring::Error> for OAuthError {
    fn from(err: keyring::Error) -> Self {
        OAuthError::Keyring(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
