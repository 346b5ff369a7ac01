//! Error types for the interface configurator
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for ifsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the interface configurator
#[derive(Error, Debug)]
pub enum Error {
    /// No unassigned address left in the pool
    #[error("address pool exhausted (size {size})")]
    PoolExhausted {
        /// Total number of addresses in the pool
        size: usize,
    },

    /// Configuration push to the device failed
    #[error("config push error: {0}")]
    Push(String),

    /// Session-level failure: server error payload, failed initial sync,
    /// or stream termination. Always fatal.
    #[error("session error: {0}")]
    Session(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a config push error
    pub fn push(msg: impl Into<String>) -> Self {
        Self::Push(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Session(err.to_string())
    }
}
