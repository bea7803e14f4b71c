//! Distill CLI library.
//!
//! Argument parsing, configuration loading, and output formatting for the
//! `distill` command-line tool.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use error::{CliError, Result};
pub use output::Formatter;
