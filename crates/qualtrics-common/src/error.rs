//! Error types shared across the tap crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid timestamp '{value}': expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD")]
    InvalidTimestamp { value: String },

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },
}
