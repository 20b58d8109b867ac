//! Error types for the thought memory.

/// Failure reported by an external collaborator (embedding source, oracle,
/// scorer or responder).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("embedding source failed: {0}")]
    Embedding(String),

    #[error("thought oracle failed: {0}")]
    Oracle(String),

    #[error("relevance scorer failed: {0}")]
    Scoring(String),

    #[error("responder failed: {0}")]
    Responder(String),
}

/// Errors produced by memory operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bucket {bucket} out of range (memory has {num_buckets} buckets)")]
    BucketOutOfRange { bucket: usize, num_buckets: usize },

    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl MemoryError {
    /// True when the error originated in an external collaborator.
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator(_))
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
