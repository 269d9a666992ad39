//! Compiler configuration, optionally loaded from a `glslx.toml` file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GlslxError, GlslxResult};

/// Name of the project config file looked up next to the input
pub const CONFIG_FILE_NAME: &str = "glslx.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Drop functions, globals and structures unreachable from `main`
    #[serde(default = "default_true")]
    pub prune: bool,
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prune: default_true(),
            preprocessor: PreprocessorConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreprocessorConfig {
    /// Predefined macros as `NAME` or `NAME=VALUE`
    #[serde(default)]
    pub defines: Vec<String>,
    /// Searched by `#include` after the input's own directory
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriterConfig {
    /// Emit compiler-injected hidden globals
    #[serde(default)]
    pub write_hidden: bool,
    /// Emit the texture/image/ray-query helper preamble for entry points
    #[serde(default = "default_true")]
    pub emit_helpers: bool,
    /// Spaces per nesting level
    #[serde(default = "default_indent")]
    pub indent: usize,
}

fn default_true() -> bool { true }
fn default_indent() -> usize { 4 }

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            write_hidden: false,
            emit_helpers: default_true(),
            indent: default_indent(),
        }
    }
}

impl Config {
    /// Load a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> GlslxResult<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| GlslxError::config(format!("{}: {}", path.display(), e.message())))
    }

    pub fn from_toml(text: &str) -> GlslxResult<Self> {
        toml::from_str(text).map_err(|e| GlslxError::config(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.writer.emit_helpers);
        assert!(!config.writer.write_hidden);
        assert_eq!(config.writer.indent, 4);
        assert!(config.prune);
        assert!(config.preprocessor.defines.is_empty());
    }

    #[test]
    fn test_preprocessor_table() {
        let config = Config::from_toml(
            "prune = false\n[preprocessor]\ndefines = [\"QUALITY=2\", \"FAST\"]\ninclude_dirs = [\"shaders/include\"]\n",
        )
        .unwrap();
        assert!(!config.prune);
        assert_eq!(config.preprocessor.defines, vec!["QUALITY=2", "FAST"]);
        assert_eq!(config.preprocessor.include_dirs, vec![PathBuf::from("shaders/include")]);
        assert_eq!(config.writer, WriterConfig::default());
    }

    #[test]
    fn test_partial_table() {
        let config = Config::from_toml("[writer]\nwrite_hidden = true\nindent = 2\n").unwrap();
        assert!(config.writer.write_hidden);
        assert!(config.writer.emit_helpers);
        assert_eq!(config.writer.indent, 2);
    }

    #[test]
    fn test_malformed() {
        let err = Config::from_toml("[writer\nindent = ").unwrap_err();
        assert!(matches!(err, GlslxError::Config { .. }));
    }

    #[test]
    fn test_missing_file() {
        let config = Config::load(Path::new("/nonexistent/glslx.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
