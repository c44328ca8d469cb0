//! Compiler configuration model.
//!
//! A [`CompilerConfig`] is handed to the compiler at construction time and
//! never stored globally, so two compilers with different delimiters can
//! coexist in one process.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{DeckhandError, Result};
use crate::types::ValidationContext;

/// Root configuration for a compiler instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Interpolation delimiters.
    pub interpolation: InterpolationSettings,
    /// Upper bound for generated safe refs.
    pub max_ref_length: usize,
    /// Context namespaces resolved by the platform, not by the compiler.
    ///
    /// Missing paths under these namespaces are left untouched instead of
    /// being reported as unresolved.
    pub ignored_namespaces: Vec<String>,
    /// Contexts used when a caller does not request any explicitly.
    pub default_contexts: Vec<ValidationContext>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationSettings::default(),
            max_ref_length: constants::DEFAULT_MAX_REF_LENGTH,
            ignored_namespaces: vec!["architect".into(), "environment".into()],
            default_contexts: vec![ValidationContext::Developer],
        }
    }
}

impl CompilerConfig {
    /// Parses a configuration from YAML text. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or the values are
    /// out of range.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(|e| DeckhandError::Config {
            message: format!("malformed compiler config: {e}"),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DeckhandError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    fn check(&self) -> Result<()> {
        if self.interpolation.open.is_empty() || self.interpolation.close.is_empty() {
            return Err(DeckhandError::Config {
                message: "interpolation delimiters must not be empty".into(),
            });
        }
        if self.max_ref_length <= constants::REF_HASH_LENGTH + constants::REF_DELIMITER.len() + 1 {
            return Err(DeckhandError::Config {
                message: format!(
                    "max_ref_length {} is too small to hold a ref",
                    self.max_ref_length
                ),
            });
        }
        Ok(())
    }
}

/// Opening and closing delimiters of an interpolation expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationSettings {
    /// Opening delimiter, `${{` by default.
    pub open: String,
    /// Closing delimiter, `}}` by default.
    pub close: String,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            open: constants::DEFAULT_INTERPOLATION_OPEN.into(),
            close: constants::DEFAULT_INTERPOLATION_CLOSE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = CompilerConfig::from_yaml_str("{}").expect("should parse");
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.interpolation.open, "${{");
        assert_eq!(config.max_ref_length, 63);
    }

    #[test]
    fn partial_yaml_overrides_selected_fields() {
        let config = CompilerConfig::from_yaml_str(
            "interpolation:\n  open: '<<'\n  close: '>>'\nmax_ref_length: 40\n",
        )
        .expect("should parse");
        assert_eq!(config.interpolation.open, "<<");
        assert_eq!(config.max_ref_length, 40);
        assert_eq!(config.ignored_namespaces, vec!["architect", "environment"]);
    }

    #[test]
    fn tiny_max_ref_length_is_rejected() {
        let err = CompilerConfig::from_yaml_str("max_ref_length: 5").expect_err("should fail");
        assert!(err.to_string().contains("too small"), "got: {err}");
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        let err = CompilerConfig::from_yaml_str("interpolation:\n  open: ''\n")
            .expect_err("should fail");
        assert!(err.to_string().contains("delimiters"), "got: {err}");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "default_contexts: [operator]").expect("should write");
        let config = CompilerConfig::load(file.path()).expect("should load");
        assert_eq!(config.default_contexts, vec![ValidationContext::Operator]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = CompilerConfig::load(Path::new("/nonexistent/deckhand.yml"))
            .expect_err("should fail");
        assert!(matches!(err, DeckhandError::Io { .. }));
    }
}
