//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur talking to the search index
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Index creation failed
    #[error("Index initialization failed: {0}")]
    IndexInitFailed(String),

    /// Search execution failed
    #[error("Search execution failed: {0}")]
    SearchFailed(String),

    /// Document indexing failed
    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    /// Document deletion failed
    #[error("Document deletion failed: {0}")]
    DeletionFailed(String),

    /// The service answered with something we cannot read
    #[error("Malformed search response: {0}")]
    MalformedResponse(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::MalformedResponse(msg) => AppError::Serialization(msg),
            _ => AppError::Network(err.to_string()),
        }
    }
}
