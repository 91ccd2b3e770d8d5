//! Error taxonomy shared by every provider backend.
//!
//! Vendor-specific failures are mapped onto these flat variants so the user
//! sees the same message shape regardless of which backend was active.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Content blocked by the provider: {0}")]
    ContentBlocked(String),

    #[error("Provider returned no usable text: {0}")]
    ContentEmpty(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Retry budget exhausted")]
    MaxRetriesExceeded,

    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, GenError>;
