//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Oracle call failed
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Oracle call exceeded the per-unit timeout
    #[error("Oracle call timed out after {0}s")]
    Timeout(u64),

    /// Response contained no parseable records
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Configuration rejected by validation
    #[error("Configuration error: {}", .0.join("; "))]
    Config(Vec<String>),

    /// A unit failed and `continue_on_chunk_error` is off
    #[error("Chunk {chunk_index} failed: {source}")]
    ChunkFailed {
        /// Index of the failing work unit
        chunk_index: usize,
        /// The unit's own failure
        source: Box<ExtractorError>,
    },

    /// The run was cancelled
    #[error("Extraction cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),
}

impl ExtractorError {
    /// Whether retrying the same oracle call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractorError::Oracle(_) | ExtractorError::Timeout(_))
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
