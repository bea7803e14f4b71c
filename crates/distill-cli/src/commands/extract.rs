//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::commands::read_input;
use crate::config::load_config;
use crate::error::Result;
use crate::output::Formatter;
use distill_domain::ExtractionOracle;
use distill_extractor::{ExtractionConfig, ExtractionResult, KnowledgeExtractor, ProgressFn};
use distill_llm::{MockOracle, OllamaOracle};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute the extract command.
pub async fn execute_extract(
    args: ExtractArgs,
    config_path: Option<&Path>,
    formatter: &Formatter,
) -> Result<()> {
    let text = read_input(&args.file)?;
    let config = load_config(config_path, &args.overrides)?;

    let result = match &args.mock_response {
        Some(path) => {
            info!(response = %path.display(), "Using canned oracle response");
            let response = std::fs::read_to_string(path)?;
            run(MockOracle::new(response), config, &text).await?
        }
        None => {
            info!(endpoint = %args.endpoint, model = %args.model, "Using Ollama oracle");
            run(OllamaOracle::new(&args.endpoint, &args.model), config, &text).await?
        }
    };

    println!("{}", formatter.format_result(&result)?);
    Ok(())
}

async fn run<O>(oracle: O, config: ExtractionConfig, text: &str) -> Result<ExtractionResult>
where
    O: ExtractionOracle + 'static,
{
    let cancel = CancellationToken::new();
    let extractor = KnowledgeExtractor::new(oracle, config)?
        .with_cancellation(cancel.clone())
        .with_error_callback(|error, unit| {
            warn!(unit, error = %error, "Unit contributed nothing");
        });

    let estimate = extractor.estimate_processing_time(text);
    info!(
        chunks = estimate.estimated_chunks,
        oracle_calls = estimate.estimated_oracle_calls,
        estimated_seconds = estimate.estimated_time_seconds,
        "Planned extraction"
    );

    let progress: &ProgressFn = &|finished, total, entities, relationships| {
        info!(finished, total, entities, relationships, "Progress");
    };

    // Ctrl-C cancels in-flight oracle calls
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling extraction");
                cancel.cancel();
            }
        }
    });

    let result = extractor.extract_full(text, Some(progress)).await;
    watcher.abort();
    Ok(result?)
}
