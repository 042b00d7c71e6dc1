//! Error types for dbot-rs
//!
//! Every failure of a snapshot generation, index build or index load surfaces
//! as one of these variants. None of them are retried automatically.

use thiserror::Error;

/// Main error type for dbot operations
#[derive(Error, Debug)]
pub enum DbotError {
    /// A snapshot or index artifact is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog connection could not be opened or stopped working
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Persisted artifacts exist but do not belong together
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// The embedding provider rejected or failed a request
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// A catalog row violated the expected shape (e.g. unexpected null)
    #[error("Malformed catalog row: {0}")]
    MalformedCatalogRow(String),

    /// Text processing errors
    #[error("Text processing error: {0}")]
    TextProcessing(String),

    /// Vector search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document loading errors
    #[error("Document error: {0}")]
    Document(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type alias for dbot operations
pub type Result<T> = std::result::Result<T, DbotError>;

impl DbotError {
    /// True when the caller should regenerate the missing artifact first
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbotError::NotFound(_))
    }
}

impl From<sqlx::Error> for DbotError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => DbotError::MalformedCatalogRow(err.to_string()),
            other => DbotError::ConnectionFailure(other.to_string()),
        }
    }
}

impl From<async_openai::error::OpenAIError> for DbotError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        DbotError::EmbeddingProvider(err.to_string())
    }
}

impl From<reqwest::Error> for DbotError {
    fn from(err: reqwest::Error) -> Self {
        DbotError::EmbeddingProvider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DbotError::NotFound("schema snapshot for sales".to_string());
        assert_eq!(error.to_string(), "Not found: schema snapshot for sales");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_error_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let dbot_error = DbotError::from(io_error);

        match dbot_error {
            DbotError::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_sqlx_error_classification() {
        let missing = DbotError::from(sqlx::Error::ColumnNotFound("type_name".to_string()));
        assert!(matches!(missing, DbotError::MalformedCatalogRow(_)));

        let closed = DbotError::from(sqlx::Error::PoolClosed);
        assert!(matches!(closed, DbotError::ConnectionFailure(_)));
        assert!(!closed.is_not_found());
    }
}
