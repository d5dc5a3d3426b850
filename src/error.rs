use thiserror::Error;

/// Errors surfaced by the replication ingestion core.
///
/// One variant per failure kind from the error handling design: storage
/// conflicts and unavailability are retryable by the caller, configuration
/// errors are fatal at construction time, and malformed metadata rejects a
/// single item without aborting the replication stream.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("storage conflict on '{id}': etag mismatch (expected {expected:?})")]
    StorageConflict { id: String, expected: Option<String> },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("resolver '{resolver}' failed on '{id}': {reason}")]
    ResolverFailure {
        id: String,
        resolver: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed metadata on '{id}': {reason}")]
    MalformedMetadata { id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("replication call cancelled on '{0}'")]
    Cancelled(String),
}

impl IngestError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::StorageConflict { .. } | IngestError::StorageUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Serialization(e.to_string())
    }
}
