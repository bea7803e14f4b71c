//! Estimate command implementation.

use crate::cli::EstimateArgs;
use crate::commands::read_input;
use crate::config::load_config;
use crate::error::Result;
use crate::output::Formatter;
use distill_extractor::KnowledgeExtractor;
use distill_llm::MockOracle;
use std::path::Path;

/// Execute the estimate command.
pub fn execute_estimate(args: EstimateArgs, config_path: Option<&Path>, formatter: &Formatter) -> Result<()> {
    let text = read_input(&args.file)?;
    let config = load_config(config_path, &args.overrides)?;

    // Estimating never calls the oracle
    let extractor = KnowledgeExtractor::new(MockOracle::default(), config)?;
    let estimate = extractor.estimate_processing_time(&text);

    println!("{}", formatter.format_estimate(&estimate)?);
    Ok(())
}
