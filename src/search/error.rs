//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors raised at the search engine boundary
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Engine call exceeded the configured timeout
    #[error("Search engine timed out after {0}s")]
    Timeout(u64),

    /// Engine could not be reached
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),

    /// Engine answered with an error status
    #[error("Search engine rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Mapping or settings declaration refused by the engine
    #[error("Mapping rejected: {0}")]
    MappingRejected(String),

    /// Document indexing failed
    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    /// Search execution failed
    #[error("Search execution failed: {0}")]
    SearchFailed(String),

    /// Query could not be built or translated
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Document or response (de)serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Tantivy error
    #[error("Tantivy error: {0}")]
    Tantivy(String),
}

impl SearchError {
    /// Whether the failure may clear up by itself on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Timeout(_) | SearchError::Unavailable(_) => true,
            SearchError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        SearchError::Tantivy(err.to_string())
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for SearchError {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        SearchError::Tantivy(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::SerializationFailed(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Timeout(_) => AppError::Timeout(err.to_string()),
            SearchError::Unavailable(msg) => AppError::SearchUnavailable(msg),
            SearchError::MappingRejected(msg) => AppError::Configuration(msg),
            SearchError::SerializationFailed(msg) => AppError::Serialization(msg),
            SearchError::InvalidQuery(msg) => AppError::Validation(msg),
            _ => AppError::SearchEngine(err.to_string()),
        }
    }
}
