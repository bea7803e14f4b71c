//! Command implementations.

mod config;
mod estimate;
mod extract;

pub use config::execute_config;
pub use estimate::execute_estimate;
pub use extract::execute_extract;

use crate::error::{CliError, Result};
use std::io::{self, Read};
use std::path::Path;

/// Read the input text from a file, or from stdin when the path is "-".
pub(crate) fn read_input(path: &Path) -> Result<String> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };

    if text.trim().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "{} contains no text",
            path.display()
        )));
    }
    Ok(text)
}
