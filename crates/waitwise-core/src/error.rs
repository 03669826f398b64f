//! Core error types for waitwise-core.
//!
//! Every guard failure in the lifecycle engine maps to one of these types.
//! Persistence and notification failures are reported here as well, although
//! the engine only surfaces persistence errors from `restore`; elsewhere it
//! logs them and keeps the decision in memory.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::Phase;

/// Core error type for waitwise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bad commit input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation invoked in the wrong lifecycle phase
    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    /// Store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected commit input. The draft stays untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("decision text must not be empty")]
    EmptyText,

    #[error("duration must be between 1 and 10080 minutes, got {0}")]
    DurationOutOfRange(u32),

    #[error("unknown decision type '{0}'")]
    UnknownType(String),

    #[error("unknown outcome '{0}' (expected completed, cancelled or snoozed)")]
    UnknownOutcome(String),
}

/// An engine operation was called in a phase that does not allow it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidStateError {
    #[error("'{operation}' is not allowed while {phase}")]
    WrongPhase { operation: &'static str, phase: Phase },

    #[error("a decision is already waiting; resolve it before starting another")]
    WaitAlreadyActive,

    #[error("the decision was changed by another session; check status and retry")]
    Superseded,
}

/// Store read/write failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open the store
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Statement execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Store is locked by another process
    #[error("Store is locked")]
    Locked,

    /// The persisted record could not be encoded or decoded
    #[error("Corrupt decision record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Notification delivery failures. Never propagated out of the engine.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notifications are not available")]
    Unavailable,

    #[error("failed to launch notification command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("notification delivery failed: {0}")]
    Delivery(String),
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

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg)
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                PersistenceError::Locked
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
