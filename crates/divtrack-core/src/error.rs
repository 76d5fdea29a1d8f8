//! Error types for divtrack-core

use thiserror::Error;

/// Result type alias using divtrack-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in divtrack-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decimal conversion error
    #[error("Invalid amount: {0}")]
    Amount(#[from] rust_decimal::Error),
}

/// Coarse classification used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something the store cannot accept
    InvalidInput,
    /// The persistence medium failed
    Storage,
}

impl Error {
    /// Classify this error for translation into a response
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Amount(_) => ErrorKind::InvalidInput,
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::Storage
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_client_side() {
        let err = Error::InvalidInput("userId must not be empty".into());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn io_failures_are_storage_errors() {
        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("disk full"));
    }
}
