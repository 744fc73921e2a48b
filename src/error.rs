//! kvrepl Error Types

use thiserror::Error;

/// Result type alias for kvrepl operations
pub type Result<T> = std::result::Result<T, Error>;

/// kvrepl error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Client-facing request errors
    #[error("Malformed request: {0}")]
    ClientError(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    // Role errors
    #[error("Operation not permitted for node role {role}: {reason}")]
    RoleMismatch { role: &'static str, reason: String },

    // Replication errors
    #[error("Quorum not reached: {reached}/{required} peers acknowledged")]
    QuorumNotReached { reached: usize, required: usize },

    #[error("Peer request failed: {0}")]
    PeerFailure(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_) | Error::QuorumNotReached { .. } | Error::Network(_)
        )
    }
}
