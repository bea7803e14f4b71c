//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use distill_extractor::{ExtractionResult, ProcessingEstimate};

/// Entities and relationships listed in summary output before truncating.
const SUMMARY_LIMIT: usize = 20;

/// Output formatter.
pub struct Formatter {
    format: CliFormat,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: CliFormat) -> Self {
        Self { format }
    }

    /// Format an extraction result.
    pub fn format_result(&self, result: &ExtractionResult) -> Result<String> {
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            CliFormat::Summary => Ok(self.format_result_summary(result)),
        }
    }

    /// Format a processing estimate.
    pub fn format_estimate(&self, estimate: &ProcessingEstimate) -> Result<String> {
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string_pretty(estimate)?),
            CliFormat::Summary => Ok(format!(
                "Strategy: {}\nText length: {} chars\nChunks: {}\nOracle calls: {}\nEstimated time: {:.0}s",
                estimate.strategy.as_str(),
                estimate.text_length,
                estimate.estimated_chunks,
                estimate.estimated_oracle_calls,
                estimate.estimated_time_seconds
            )),
        }
    }

    fn format_result_summary(&self, result: &ExtractionResult) -> String {
        let mut lines = vec![result.statistics.summary(), String::new()];

        lines.push(format!("Entities ({}):", result.entities.len()));
        for entity in result.entities.iter().take(SUMMARY_LIMIT) {
            let types: Vec<&str> = entity.types.iter().map(String::as_str).collect();
            lines.push(format!(
                "  {} [{}] ({:.2})",
                entity.name,
                types.join(", "),
                entity.confidence
            ));
        }
        if result.entities.len() > SUMMARY_LIMIT {
            lines.push(format!("  ... and {} more", result.entities.len() - SUMMARY_LIMIT));
        }

        lines.push(String::new());
        lines.push(format!("Relationships ({}):", result.relationships.len()));
        for relationship in result.relationships.iter().take(SUMMARY_LIMIT) {
            lines.push(format!(
                "  {} -[{}]-> {} ({:.2})",
                relationship.source,
                relationship.primary_type().unwrap_or("?"),
                relationship.target,
                relationship.confidence
            ));
        }
        if result.relationships.len() > SUMMARY_LIMIT {
            lines.push(format!(
                "  ... and {} more",
                result.relationships.len() - SUMMARY_LIMIT
            ));
        }

        lines.join("\n")
    }
}
