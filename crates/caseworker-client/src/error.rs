//! Error types for the chat client

use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay returned status {0}")]
    Status(u16),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("A response is already in progress")]
    Busy,
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
