//! Error types for the knowledge base.
//!
//! Component crates return the narrow error enums ([`ExtractError`],
//! [`EmbedError`], [`StoreError`]); orchestration code lifts them into
//! [`Error`] with `?`. Two lifts are not plain wrapping: an unsupported file
//! type becomes [`Error::UnsupportedFileType`] and a missing entry becomes
//! [`Error::EntryNotFound`], since callers branch on those.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for knowledge base operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No extractor is registered for the file extension
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A supported file could not be read
    #[error("extraction error: {0}")]
    Extraction(ExtractError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("store error: {0}")]
    Store(StoreError),

    /// The entry does not exist for this company
    #[error("knowledge entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Caller supplied an unusable value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call later may succeed.
    ///
    /// Only provider and storage outages qualify. Nothing in this workspace
    /// retries on its own; the flag is for upstream callers.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Embedding(EmbedError::Provider(_)) | Error::Store(StoreError::Unavailable(_))
        )
    }
}

impl From<ExtractError> for Error {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedType(ext) => Error::UnsupportedFileType(ext),
            other => Error::Extraction(other),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Error::EntryNotFound(id),
            other => Error::Store(other),
        }
    }
}

/// Text extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("malformed {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Shorthand for a [`ExtractError::Malformed`] error.
    pub fn malformed(file: impl Into<String>, reason: impl ToString) -> Self {
        ExtractError::Malformed {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Remote provider failure (transport, auth, quota, bad response)
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("batch size mismatch: sent {sent} texts, received {received} embeddings")]
    BatchMismatch { sent: usize, received: usize },
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing store unreachable or not initialized
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("update failed: {0}")]
    Update(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("entry not found: {0}")]
    NotFound(Uuid),
}

/// Result type alias for knowledge base operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    // ========== ExtractError Tests ==========

    #[test]
    fn test_extract_error_unsupported_type_display() {
        let err = ExtractError::UnsupportedType("pptx".to_string());
        assert_eq!(err.to_string(), "unsupported file type: pptx");
    }

    #[test]
    fn test_extract_error_malformed_display() {
        let err = ExtractError::malformed("report.pdf", "missing xref table");
        assert_eq!(err.to_string(), "malformed report.pdf: missing xref table");
    }

    #[test]
    fn test_extract_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: ExtractError = io_err.into();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    // ========== EmbedError Tests ==========

    #[test]
    fn test_embed_error_provider_display() {
        let err = EmbedError::Provider("HTTP 429: rate limited".to_string());
        assert_eq!(
            err.to_string(),
            "embedding provider error: HTTP 429: rate limited"
        );
    }

    #[test]
    fn test_embed_error_dimension_mismatch_display() {
        let err = EmbedError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected 1536, got 768"
        );
    }

    #[test]
    fn test_embed_error_batch_mismatch_display() {
        let err = EmbedError::BatchMismatch {
            sent: 3,
            received: 2,
        };
        assert!(err.to_string().contains("sent 3 texts"));
    }

    // ========== StoreError Tests ==========

    #[test]
    fn test_store_error_unavailable_display() {
        let err = StoreError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[test]
    fn test_store_error_dimension_mismatch_display() {
        let err = StoreError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 4, got 3"
        );
    }

    // ========== Main Error Tests ==========

    #[test]
    fn test_unsupported_type_lifts_to_unsupported_file_type() {
        let err: Error = ExtractError::UnsupportedType("exe".to_string()).into();
        assert!(matches!(err, Error::UnsupportedFileType(ref ext) if ext == "exe"));
    }

    #[test]
    fn test_malformed_lifts_to_extraction() {
        let err: Error = ExtractError::malformed("a.docx", "not a zip").into();
        assert!(matches!(err, Error::Extraction(ExtractError::Malformed { .. })));
        assert!(err.to_string().starts_with("extraction error"));
    }

    #[test]
    fn test_not_found_lifts_to_entry_not_found() {
        let id = Uuid::new_v4();
        let err: Error = StoreError::NotFound(id).into();
        assert!(matches!(err, Error::EntryNotFound(found) if found == id));
    }

    #[test]
    fn test_store_error_lifts_to_store() {
        let err: Error = StoreError::Query("timeout".to_string()).into();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::from(EmbedError::Provider("503".to_string())).is_retryable());
        assert!(Error::from(StoreError::Unavailable("down".to_string())).is_retryable());

        assert!(!Error::UnsupportedFileType("exe".to_string()).is_retryable());
        assert!(!Error::EntryNotFound(Uuid::new_v4()).is_retryable());
        assert!(!Error::from(ExtractError::malformed("a.pdf", "bad")).is_retryable());
        assert!(
            !Error::from(EmbedError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_error_config_display() {
        let err = Error::Config("invalid path".to_string());
        assert_eq!(err.to_string(), "config error: invalid path");
    }
}
