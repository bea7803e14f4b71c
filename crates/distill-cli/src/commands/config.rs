//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::config::preset;
use crate::error::{CliError, Result};

/// Execute the config command.
pub fn execute_config(args: ConfigArgs) -> Result<()> {
    let toml = preset(args.preset).to_toml().map_err(CliError::Config)?;
    println!("{}", toml);
    Ok(())
}
