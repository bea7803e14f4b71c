//! Distill Extractor
//!
//! Turns free text into a consolidated knowledge graph of typed entities and
//! relationships, using an extraction oracle (usually an LLM) one chunk at a
//! time.
//!
//! # Architecture
//!
//! ```text
//! Text → TextChunker → [context → prompt → oracle → parser] per unit
//!      → EntityMerger → RelationshipDiscoverer → filtering → ExtractionResult
//! ```
//!
//! # Key Features
//!
//! - **Three dispatch strategies**: incremental (context-enhanced), parallel
//!   (bounded concurrency), and sliding windows over adjacent chunks
//! - **Entity consolidation**: fuzzy, alias-aware merging with per-property
//!   confidence arbitration
//! - **Cross-chunk discovery**: co-occurrence and transitive inference,
//!   validated against entity types
//! - **Resilience**: per-call timeouts, exponential-backoff retries, and
//!   cooperative cancellation
//!
//! # Example Usage
//!
//! ```no_run
//! use distill_extractor::{ExtractionConfig, KnowledgeExtractor};
//! use distill_llm::MockOracle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = MockOracle::new(
//!     r#"{"kind":"entity","name":"Alice","types":["person"],"confidence":0.9}"#,
//! );
//! let extractor = KnowledgeExtractor::new(oracle, ExtractionConfig::default())?;
//!
//! let result = extractor.extract_full("Alice works at Acme Corp.", None).await?;
//!
//! println!("Entities: {}", result.entities.len());
//! println!("Relationships: {}", result.relationships.len());
//! println!("{}", result.statistics.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod context;
mod discoverer;
mod error;
mod extractor;
mod merger;
mod parser;
mod prompt;
mod retry;
mod rules;
mod similarity;
mod stats;
mod types;

#[cfg(test)]
mod tests;

pub use chunking::TextChunker;
pub use config::{ConfidenceMergeStrategy, ExtractionConfig, ProcessingStrategy};
pub use context::{ContextManager, ContextStatistics};
pub use discoverer::{DiscoveryStatistics, RelationshipDiscoverer, METHOD_COOCCURRENCE, METHOD_TRANSITIVE};
pub use error::ExtractorError;
pub use extractor::{ErrorCallback, KnowledgeExtractor, ProgressFn};
pub use merger::{AliasTable, EntityMerger, MergeOutcome, MergeStatistics};
pub use parser::{parse_response, DEFAULT_RECORD_CONFIDENCE, FALLBACK_RELATION};
pub use prompt::PromptBuilder;
pub use retry::{RetryOutcome, RetryPolicy};
pub use rules::{CooccurrenceRule, EndpointConstraint, RuleTable, TransitiveRule, RULE_TABLE_VERSION};
pub use similarity::{AliasRules, NameSimilarity, SequenceRatio};
pub use stats::ProcessingStatistics;
pub use types::{
    ChunkResult, ExtractionResult, ParsedRecords, ProcessingEstimate, RawEntity, RawRelationship,
};
