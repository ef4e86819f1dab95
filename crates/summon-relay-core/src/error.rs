//! Error types for the relay

use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay error types
#[derive(Debug, Error)]
pub enum RelayError {
    /// Reading, writing or deleting a record failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record file exists but could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Required fields missing for an explicit registration
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A bounded wait ran out of attempts
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl RelayError {
    /// Wrap an I/O error with the operation that failed
    pub fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        RelayError::Storage(format!("{}: {}", context, err))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

/// JSON-RPC error codes for the relay
pub mod error_codes {
    pub const STORAGE_ERROR: i32 = -32010;
    pub const VALIDATION_ERROR: i32 = -32011;
    pub const TIMEOUT: i32 = -32012;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
