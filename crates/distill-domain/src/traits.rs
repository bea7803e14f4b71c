//! Trait definitions for external interactions
//!
//! These traits define the boundaries between pipeline logic and
//! infrastructure. Implementations live in other crates.

use async_trait::async_trait;

/// The text-to-structured-records inference boundary
///
/// Implemented by the infrastructure layer (distill-llm). The extractor sends
/// one prompt per work unit and parses the returned text into entity and
/// relationship records.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Error type for oracle operations
    type Error: std::fmt::Display + Send;

    /// Run one inference call and return the raw response text
    async fn complete(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Human-readable name of the backing model, for logs and statistics
    fn model_name(&self) -> &str {
        "oracle"
    }
}
