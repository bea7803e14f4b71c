//! Record and result types for extraction

use crate::config::{ExtractionConfig, ProcessingStrategy};
use crate::context::ContextStatistics;
use crate::discoverer::DiscoveryStatistics;
use crate::merger::MergeStatistics;
use crate::stats::ProcessingStatistics;
use distill_domain::{DynamicEntity, DynamicRelationship};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An entity record as parsed from one oracle response, before merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Entity name as written by the oracle
    pub name: String,

    /// Type labels as written by the oracle
    pub types: Vec<String>,

    /// Properties
    pub properties: BTreeMap<String, Value>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Optional description (legacy records carry one)
    pub description: Option<String>,
}

impl RawEntity {
    /// A record with no types or properties and default confidence
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            properties: BTreeMap::new(),
            confidence: 0.5,
            description: None,
        }
    }
}

/// A relationship record as parsed from one oracle response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    /// Source entity name as written by the oracle
    pub source: String,

    /// Target entity name as written by the oracle
    pub target: String,

    /// Relationship type labels
    pub types: Vec<String>,

    /// Properties
    pub properties: BTreeMap<String, Value>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Strength in [0, 1]
    pub strength: f64,

    /// Optional description
    pub description: Option<String>,
}

impl RawRelationship {
    /// A record with one type label and default confidence and strength
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            types: vec![label.into()],
            properties: BTreeMap::new(),
            confidence: 0.5,
            strength: 0.5,
            description: None,
        }
    }
}

/// Records parsed out of one oracle response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    /// Entity records
    pub entities: Vec<RawEntity>,
    /// Relationship records
    pub relationships: Vec<RawRelationship>,
    /// Lines or array items that were dropped
    pub rejected: usize,
}

impl ParsedRecords {
    /// Whether nothing was parsed
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Outcome of one work unit (a chunk, or a sliding-window group of chunks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Work unit index
    pub chunk_index: usize,

    /// Chunk indices covered by this unit
    pub chunk_indices: Vec<usize>,

    /// Entities parsed from the oracle response
    pub entities: Vec<RawEntity>,

    /// Relationships parsed from the oracle response
    pub relationships: Vec<RawRelationship>,

    /// Wall time spent on the unit, retries included
    pub processing_time_ms: u64,

    /// Length of the unit's source text (characters)
    pub text_length: usize,

    /// Oracle calls made for this unit
    pub attempts: usize,

    /// Failure message when the unit contributed nothing
    pub error: Option<String>,
}

impl ChunkResult {
    /// Whether the unit succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Final output of an extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Canonical entities that passed `min_entity_confidence`, sorted by name
    pub entities: Vec<DynamicEntity>,

    /// Direct and discovered relationships that passed filtering
    pub relationships: Vec<DynamicRelationship>,

    /// Run statistics
    pub statistics: ProcessingStatistics,

    /// The configuration the run used
    pub config: ExtractionConfig,

    /// Entity merge statistics
    pub entity_merge_stats: MergeStatistics,

    /// Cross-chunk discovery statistics
    pub relationship_discovery_stats: DiscoveryStatistics,

    /// Context tracking statistics
    pub context_statistics: ContextStatistics,

    /// Per-unit outcomes, in unit order
    pub chunk_results: Vec<ChunkResult>,
}

impl ExtractionResult {
    /// An empty result for input that produced no chunks
    pub fn empty(config: &ExtractionConfig) -> Self {
        Self {
            entities: Vec::new(),
            relationships: Vec::new(),
            statistics: ProcessingStatistics::new(config.strategy),
            config: config.clone(),
            entity_merge_stats: MergeStatistics::default(),
            relationship_discovery_stats: DiscoveryStatistics::default(),
            context_statistics: ContextStatistics::default(),
            chunk_results: Vec::new(),
        }
    }

    /// Look up an entity by exact name
    pub fn entity(&self, name: &str) -> Option<&DynamicEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// All relationships from `source` to `target`
    pub fn relationships_between(&self, source: &str, target: &str) -> Vec<&DynamicRelationship> {
        self.relationships
            .iter()
            .filter(|r| r.source == source && r.target == target)
            .collect()
    }
}

/// Cost estimate for extracting a text without calling the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingEstimate {
    /// Estimated wall time
    pub estimated_time_seconds: f64,
    /// Chunks the text splits into
    pub estimated_chunks: usize,
    /// Oracle calls the strategy would make
    pub estimated_oracle_calls: usize,
    /// Strategy the estimate assumes
    pub strategy: ProcessingStrategy,
    /// Text length (characters)
    pub text_length: usize,
}
