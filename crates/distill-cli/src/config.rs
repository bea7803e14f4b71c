//! Extraction configuration loading for the CLI.
//!
//! The file named by `--config` is read first, then command-line flags are
//! applied on top. Validation is left to the extractor so that every problem
//! is reported at once.

use crate::cli::{ConfigOverrides, PresetArg};
use crate::error::Result;
use distill_extractor::ExtractionConfig;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load the configuration file (or defaults) and apply flag overrides.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ExtractionConfig> {
    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration file");
            let contents = fs::read_to_string(path)?;
            toml::from_str::<ExtractionConfig>(&contents)?
        }
        None => ExtractionConfig::default(),
    };

    apply_overrides(&mut config, overrides);
    Ok(config)
}

/// Apply command-line overrides to a configuration.
pub fn apply_overrides(config: &mut ExtractionConfig, overrides: &ConfigOverrides) {
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy.into();
    }
    if let Some(chunk_size) = overrides.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = overrides.chunk_overlap {
        config.chunk_overlap = chunk_overlap;
    }
    if let Some(max_concurrent) = overrides.max_concurrent {
        config.max_concurrent_chunks = max_concurrent;
    }
}

/// The configuration a preset stands for.
pub fn preset(preset: PresetArg) -> ExtractionConfig {
    match preset {
        PresetArg::Default => ExtractionConfig::default(),
        PresetArg::Fast => ExtractionConfig::fast(),
        PresetArg::Thorough => ExtractionConfig::thorough(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StrategyArg;
    use distill_extractor::ProcessingStrategy;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn no_overrides() -> ConfigOverrides {
        ConfigOverrides {
            strategy: None,
            chunk_size: None,
            chunk_overlap: None,
            max_concurrent: None,
        }
    }

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None, &no_overrides()).unwrap();
        assert_eq!(config, ExtractionConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let file = temp_file("strategy = \"parallel\"\nchunk_size = 900\nmax_retries = 1\n");
        let overrides = ConfigOverrides {
            strategy: Some(StrategyArg::SlidingWindow),
            ..no_overrides()
        };

        let config = load_config(Some(file.path()), &overrides).unwrap();

        assert_eq!(config.strategy, ProcessingStrategy::SlidingWindow);
        assert_eq!(config.chunk_size, 900);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.chunk_overlap, ExtractionConfig::default().chunk_overlap);
    }

    #[test]
    fn test_malformed_file_is_a_toml_error() {
        let file = temp_file("chunk_size = \"lots\"\n");
        let result = load_config(Some(file.path()), &no_overrides());
        assert!(matches!(result, Err(crate::CliError::Toml(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let path = PathBuf::from("/definitely/not/here/distill.toml");
        assert!(matches!(
            load_config(Some(&path), &no_overrides()),
            Err(crate::CliError::Io(_))
        ));
    }

    #[test]
    fn test_presets() {
        assert_eq!(preset(PresetArg::Fast).strategy, ProcessingStrategy::Parallel);
        assert_eq!(preset(PresetArg::Thorough).strategy, ProcessingStrategy::SlidingWindow);
    }
}
