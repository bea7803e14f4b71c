//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use distill_extractor::ProcessingStrategy;
use std::path::PathBuf;

/// Distill - extract a knowledge graph from text with an LLM.
#[derive(Debug, Parser)]
#[command(name = "distill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "summary")]
    pub format: CliFormat,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "DISTILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Human-readable summary (default)
    Summary,
    /// Full JSON payload
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract entities and relationships from a text file
    Extract(ExtractArgs),

    /// Estimate chunks, oracle calls, and time without calling the oracle
    Estimate(EstimateArgs),

    /// Print a configuration preset as TOML
    Config(ConfigArgs),
}

/// Settings shared by commands that build an extraction config.
#[derive(Debug, Clone, Args)]
pub struct ConfigOverrides {
    /// Processing strategy
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Target chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Concurrent oracle calls for the parallel strategy
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Text file to extract from ("-" reads stdin)
    pub file: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Ollama endpoint
    #[arg(long, env = "OLLAMA_HOST", default_value = distill_llm::ollama::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Model name
    #[arg(short, long, env = "DISTILL_MODEL", default_value = "llama3")]
    pub model: String,

    /// Answer every prompt with the contents of this file instead of calling Ollama
    #[arg(long)]
    pub mock_response: Option<PathBuf>,
}

/// Arguments for the estimate command.
#[derive(Debug, Parser)]
pub struct EstimateArgs {
    /// Text file to estimate ("-" reads stdin)
    pub file: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Preset to print
    #[arg(value_enum, default_value = "default")]
    pub preset: PresetArg,
}

/// Processing strategies accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    /// One chunk at a time with accumulated context
    Incremental,
    /// Chunks concurrently, no context
    Parallel,
    /// Overlapping groups of adjacent chunks
    SlidingWindow,
}

impl From<StrategyArg> for ProcessingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Incremental => ProcessingStrategy::Incremental,
            StrategyArg::Parallel => ProcessingStrategy::Parallel,
            StrategyArg::SlidingWindow => ProcessingStrategy::SlidingWindow,
        }
    }
}

/// Configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Parallel, fewer retries
    Fast,
    /// Sliding windows, stricter thresholds
    Thorough,
}
