use thiserror::Error;

/// Main error type for textrie operations
#[derive(Error, Debug)]
pub enum TextrieError {
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] std::io::Error),

    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for textrie operations
pub type Result<T> = std::result::Result<T, TextrieError>;

impl TextrieError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        TextrieError::CorruptIndex(msg.into())
    }

    /// Check if this error means the on-disk structure is damaged
    pub fn is_corruption(&self) -> bool {
        matches!(self, TextrieError::CorruptIndex(_))
    }

    /// Check if this error indicates a transient failure that could be retried.
    ///
    /// Nothing is retried at this layer; storage retries belong below it.
    pub fn is_retriable(&self) -> bool {
        false
    }
}
