//! Error types for `AppCache-Lock` core library.

use thiserror::Error;

/// Result type alias using `AppCache-Lock` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `AppCache-Lock` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// System memory could not be inspected
    #[error("Memory inspection error: {0}")]
    Memory(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
