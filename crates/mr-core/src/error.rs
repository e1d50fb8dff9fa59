//! Core error types for m-Relay

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the m-relay ecosystem
#[derive(Error, Debug)]
pub enum RelayError {
    /// Unknown instance ID on a per-instance operation
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// Duplicate create for an ID with a live transport
    #[error("Instance already exists: {0}")]
    AlreadyExists(String),

    /// Send attempted on a session that is not ready
    #[error("Instance not connected: {0}")]
    NotConnected(String),

    /// Underlying connect/send error, message preserved verbatim
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Unrecoverable pairing rejection
    #[error("Authentication failure: {0}")]
    AuthFailure(String),

    /// Invalid caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Row not found
    #[error("Row not found: {0}")]
    RowNotFound(String),

    /// Store unavailable or rejected the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Serialization of a row failed
    #[error("Row serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RelayError {
    /// Taxonomy kind as a stable string for API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::NotFound(_) => "not_found",
            RelayError::AlreadyExists(_) => "already_exists",
            RelayError::NotConnected(_) => "not_connected",
            RelayError::TransportFailure(_) => "transport_failure",
            RelayError::AuthFailure(_) => "auth_failure",
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::Store(_) => "store_error",
            RelayError::Config(_) => "config_error",
            RelayError::Io(_) => "io_error",
        }
    }
}
