//! Configuration for the knowledge extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How work units are dispatched to the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// One chunk at a time, each prompt enriched with what was learned so far
    #[default]
    Incremental,
    /// All chunks concurrently, bounded by `max_concurrent_chunks`
    Parallel,
    /// Overlapping groups of adjacent chunks, one oracle call per group
    SlidingWindow,
}

impl ProcessingStrategy {
    /// Stable lower snake case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStrategy::Incremental => "incremental",
            ProcessingStrategy::Parallel => "parallel",
            ProcessingStrategy::SlidingWindow => "sliding_window",
        }
    }
}

impl std::str::FromStr for ProcessingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "incremental" => Ok(ProcessingStrategy::Incremental),
            "parallel" => Ok(ProcessingStrategy::Parallel),
            "sliding_window" => Ok(ProcessingStrategy::SlidingWindow),
            other => Err(format!("Unknown processing strategy: {}", other)),
        }
    }
}

/// How the overall confidence of merged duplicates is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMergeStrategy {
    /// Keep the larger confidence
    #[default]
    Max,
    /// Average weighted by each record's property count
    WeightedAvg,
    /// Add a tenth of the secondary confidence, capped at 1
    Accumulate,
}

/// Configuration for the knowledge extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Dispatch strategy
    pub strategy: ProcessingStrategy,

    /// Maximum chunk size (characters)
    pub chunk_size: usize,

    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,

    /// Concurrent oracle calls under the parallel strategy
    pub max_concurrent_chunks: usize,

    /// Name similarity at or above which two entities merge
    pub entity_similarity_threshold: f64,

    /// Confidence combination for merged entities
    pub confidence_merge_strategy: ConfidenceMergeStrategy,

    /// Enable suffix/honorific/transliteration alias matching
    pub enable_entity_aliasing: bool,

    /// Enable co-occurrence and transitive relationship discovery
    pub enable_cross_chunk_relations: bool,

    /// Minimum confidence for a discovered relationship
    ///
    /// Transitive links score `base * c1 * c2`. At the default of 0.6 the
    /// 0.6-base rules (such as `indirectly_works_for`) only fire on fully
    /// confident premises, while 0.7-base chains (`part_of`, `located_in`)
    /// fire once `c1 * c2 >= 0.86`. Lower it to infer from weaker evidence.
    pub relation_confidence_threshold: f64,

    /// Prepend a summary of known entities to later prompts
    pub enable_context_enhancement: bool,

    /// Maximum key entities rendered into a prompt
    pub max_context_entities: usize,

    /// How many previous units count as "recent"
    pub context_window_size: usize,

    /// Chunks per group under the sliding-window strategy
    pub sliding_window_size: usize,

    /// Entities below this confidence are left out of the result
    pub min_entity_confidence: f64,

    /// Relationships below this confidence are left out of the result
    pub min_relationship_confidence: f64,

    /// Retries per unit after the first failed oracle call
    pub max_retries: usize,

    /// Initial retry backoff (milliseconds)
    pub retry_backoff_ms: u64,

    /// Upper bound on retry backoff (milliseconds)
    pub max_retry_backoff_ms: u64,

    /// Timeout for a single oracle call (seconds)
    pub chunk_timeout_secs: u64,

    /// Keep going when a unit fails
    pub continue_on_chunk_error: bool,
}

impl ExtractionConfig {
    /// Timeout for a single oracle call
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    /// Initial retry backoff
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Upper bound on retry backoff
    pub fn max_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.max_retry_backoff_ms)
    }

    /// Validate the configuration, reporting every problem at once
    ///
    /// An empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push("chunk_size must be positive".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            errors.push("chunk_overlap must be less than chunk_size".to_string());
        }
        if self.max_concurrent_chunks == 0 {
            errors.push("max_concurrent_chunks must be positive".to_string());
        }
        if self.sliding_window_size == 0 {
            errors.push("sliding_window_size must be positive".to_string());
        }
        if self.chunk_timeout_secs == 0 {
            errors.push("chunk_timeout_secs must be positive".to_string());
        }

        let thresholds = [
            ("entity_similarity_threshold", self.entity_similarity_threshold),
            ("relation_confidence_threshold", self.relation_confidence_threshold),
            ("min_entity_confidence", self.min_entity_confidence),
            ("min_relationship_confidence", self.min_relationship_confidence),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be between 0 and 1", name));
            }
        }

        errors
    }
}

impl Default for ExtractionConfig {
    /// Balanced defaults: incremental processing with context enhancement
    fn default() -> Self {
        Self {
            strategy: ProcessingStrategy::Incremental,
            chunk_size: 1500,
            chunk_overlap: 100,
            max_concurrent_chunks: 3,
            entity_similarity_threshold: 0.8,
            confidence_merge_strategy: ConfidenceMergeStrategy::Max,
            enable_entity_aliasing: true,
            enable_cross_chunk_relations: true,
            relation_confidence_threshold: 0.6,
            enable_context_enhancement: true,
            max_context_entities: 10,
            context_window_size: 2,
            sliding_window_size: 3,
            min_entity_confidence: 0.3,
            min_relationship_confidence: 0.4,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_retry_backoff_ms: 8_000,
            chunk_timeout_secs: 120,
            continue_on_chunk_error: true,
        }
    }
}

impl ExtractionConfig {
    /// Fast preset: parallel dispatch, larger chunks, no prompt enrichment
    pub fn fast() -> Self {
        Self {
            strategy: ProcessingStrategy::Parallel,
            chunk_size: 3000,
            chunk_overlap: 150,
            max_concurrent_chunks: 6,
            enable_context_enhancement: false,
            max_retries: 1,
            chunk_timeout_secs: 60,
            ..Self::default()
        }
    }

    /// Thorough preset: sliding windows and stricter output filtering
    pub fn thorough() -> Self {
        Self {
            strategy: ProcessingStrategy::SlidingWindow,
            chunk_size: 1000,
            chunk_overlap: 200,
            entity_similarity_threshold: 0.85,
            confidence_merge_strategy: ConfidenceMergeStrategy::WeightedAvg,
            max_context_entities: 15,
            context_window_size: 3,
            min_entity_confidence: 0.5,
            min_relationship_confidence: 0.5,
            max_retries: 5,
            chunk_timeout_secs: 300,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractionConfig::default().validate().is_empty());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractionConfig::fast().validate().is_empty());
        assert!(ExtractionConfig::thorough().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let config = ExtractionConfig {
            chunk_size: 0,
            max_concurrent_chunks: 0,
            entity_similarity_threshold: 1.5,
            min_relationship_confidence: -0.1,
            ..ExtractionConfig::default()
        };

        let errors = config.validate();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| e.contains("chunk_size must be positive")));
        assert!(errors.iter().any(|e| e.contains("chunk_overlap")));
        assert!(errors.iter().any(|e| e.contains("max_concurrent_chunks")));
        assert!(errors.iter().any(|e| e.contains("entity_similarity_threshold")));
        assert!(errors.iter().any(|e| e.contains("min_relationship_confidence")));
    }

    #[test]
    fn test_overlap_equal_to_size_is_rejected() {
        let config = ExtractionConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ExtractionConfig::default()
        };
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("parallel".parse::<ProcessingStrategy>(), Ok(ProcessingStrategy::Parallel));
        assert_eq!(
            "Sliding-Window".parse::<ProcessingStrategy>(),
            Ok(ProcessingStrategy::SlidingWindow)
        );
        assert!("batch".parse::<ProcessingStrategy>().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractionConfig::thorough();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractionConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractionConfig::from_toml(
            "strategy = \"parallel\"\nconfidence_merge_strategy = \"accumulate\"\n",
        )
        .unwrap();

        assert_eq!(parsed.strategy, ProcessingStrategy::Parallel);
        assert_eq!(parsed.confidence_merge_strategy, ConfidenceMergeStrategy::Accumulate);
        assert_eq!(parsed.chunk_size, 1500);
    }
}
