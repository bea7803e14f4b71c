//! Per-run processing statistics

use crate::config::ProcessingStrategy;
use crate::types::ChunkResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Statistics collected during one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    /// Strategy the run used
    pub strategy: ProcessingStrategy,

    /// Chunks the input was split into
    pub total_chunks: usize,

    /// Work units dispatched (equals `total_chunks` except for sliding windows)
    pub total_units: usize,

    /// Distinct chunks covered by at least one successful unit
    pub processed_chunks: usize,

    /// Units that succeeded
    pub successful_units: usize,

    /// Units that failed
    pub failed_units: usize,

    /// Oracle calls made, retries included
    pub oracle_calls: usize,

    /// Oracle calls beyond the first per unit
    pub retries: usize,

    /// Entity records parsed before merging
    pub raw_entities: usize,

    /// Relationship records parsed before merging
    pub raw_relationships: usize,

    /// Entities in the final result
    pub final_entities: usize,

    /// Relationships in the final result
    pub final_relationships: usize,

    /// Relationships added by cross-chunk discovery (before filtering)
    pub discovered_relationships: usize,

    /// Successful units / dispatched units (0 when nothing ran)
    pub success_rate: f64,

    /// Mean wall time per finished unit
    pub average_chunk_time_ms: f64,

    /// Wall time of the whole run
    pub total_time_ms: u64,

    #[serde(skip)]
    covered: BTreeSet<usize>,

    #[serde(skip)]
    unit_time_ms: u64,
}

impl ProcessingStatistics {
    /// Empty statistics for a run with the given strategy
    pub fn new(strategy: ProcessingStrategy) -> Self {
        Self {
            strategy,
            total_chunks: 0,
            total_units: 0,
            processed_chunks: 0,
            successful_units: 0,
            failed_units: 0,
            oracle_calls: 0,
            retries: 0,
            raw_entities: 0,
            raw_relationships: 0,
            final_entities: 0,
            final_relationships: 0,
            discovered_relationships: 0,
            success_rate: 0.0,
            average_chunk_time_ms: 0.0,
            total_time_ms: 0,
            covered: BTreeSet::new(),
            unit_time_ms: 0,
        }
    }

    /// Record a finished unit
    pub fn record_unit(&mut self, result: &ChunkResult) {
        self.oracle_calls += result.attempts;
        self.retries += result.attempts.saturating_sub(1);
        self.unit_time_ms += result.processing_time_ms;

        if result.is_success() {
            self.successful_units += 1;
            self.raw_entities += result.entities.len();
            self.raw_relationships += result.relationships.len();
            self.covered.extend(result.chunk_indices.iter().copied());
        } else {
            self.failed_units += 1;
        }

        self.processed_chunks = self.covered.len();
        self.success_rate = if self.total_units == 0 {
            0.0
        } else {
            self.successful_units as f64 / self.total_units as f64
        };
        self.average_chunk_time_ms = self.unit_time_ms as f64 / self.finished_units() as f64;
    }

    /// Units finished so far
    pub fn finished_units(&self) -> usize {
        self.successful_units + self.failed_units
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Extraction Summary".to_string(),
            "==================".to_string(),
            format!("Strategy: {}", self.strategy.as_str()),
            format!("Chunks: {} ({} processed)", self.total_chunks, self.processed_chunks),
            format!("Units: {} ({} failed)", self.total_units, self.failed_units),
            format!("Success rate: {:.1}%", self.success_rate * 100.0),
            format!("Oracle calls: {} ({} retries)", self.oracle_calls, self.retries),
            format!("Average time per unit: {:.0}ms", self.average_chunk_time_ms),
            format!("Total time: {}ms", self.total_time_ms),
            String::new(),
            format!("Entities: {} raw -> {} final", self.raw_entities, self.final_entities),
            format!(
                "Relationships: {} raw + {} discovered -> {} final",
                self.raw_relationships, self.discovered_relationships, self.final_relationships
            ),
        ];

        if self.failed_units > 0 {
            lines.push(String::new());
            lines.push(format!("Warning: {} unit(s) contributed nothing", self.failed_units));
        }

        lines.join("\n")
    }
}
