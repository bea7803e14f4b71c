//! Distill CLI - extract a knowledge graph from text with an LLM.

use clap::Parser;
use distill_cli::{commands, Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Log to stderr so stdout stays clean for JSON output
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let formatter = Formatter::new(cli.format);
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, config_path, &formatter).await?,
        Command::Estimate(args) => commands::execute_estimate(args, config_path, &formatter)?,
        Command::Config(args) => commands::execute_config(args)?,
    }

    Ok(())
}
