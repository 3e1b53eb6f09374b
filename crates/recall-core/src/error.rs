//! Error types for the retrieval system.

use thiserror::Error;

/// Result type alias using RecallError.
pub type Result<T> = std::result::Result<T, RecallError>;

/// Errors that can occur during retrieval.
///
/// Individual sub-search failures are not errors: they are caught at the
/// hybrid-search boundary and surface only through stats. Only a retrieval
/// in which every sub-search came back empty escalates to `TotalFailure`.
#[derive(Error, Debug)]
pub enum RecallError {
    /// Every sub-search across every variant produced nothing.
    #[error(
        "retrieval produced no results: all {searches} sub-searches empty ({failed} failed)"
    )]
    TotalFailure { searches: usize, failed: usize },

    /// Variant generator error.
    #[error("Variant generation error: {message}")]
    Generation { message: String },

    /// Search backend error.
    #[error("Search error: {message}")]
    Search { message: String },

    /// Archive lookup error.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RecallError {
    /// Create a variant generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a search backend error.
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    /// Create an archive lookup error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
