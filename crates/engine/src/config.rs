//! Runtime configuration via `memora.toml`
//!
//! Settings that apply registry-wide. Every key is optional; a missing key
//! takes its default, so an empty file is a valid configuration.

use memora_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "memora.toml";

/// Registry configuration loaded from `memora.toml`.
///
/// # Example
///
/// ```toml
/// # Memoize newly registered modules (default: true)
/// memoize = true
///
/// # Separator used for generated duplicate keys (default: "_")
/// duplicate_separator = "_"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Memoization state of newly registered modules.
    #[serde(default = "default_memoize")]
    pub memoize: bool,
    /// Joins the original key and a counter when `duplicate` picks a key.
    #[serde(default = "default_duplicate_separator")]
    pub duplicate_separator: String,
}

fn default_memoize() -> bool {
    true
}

fn default_duplicate_separator() -> String {
    "_".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memoize: default_memoize(),
            duplicate_separator: default_duplicate_separator(),
        }
    }
}

impl RuntimeConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Memora runtime configuration
#
# Memoize newly registered modules (default: true)
# Individual modules can still be toggled at runtime.
memoize = true

# Separator for keys generated by ModuleRegistry::duplicate (default: "_")
# A duplicate of "scf" is named "scf_1", then "scf_2", ...
duplicate_separator = "_"
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid TOML for this
    /// structure, or if the duplicate separator is empty.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        // An empty separator lets "a" + "1" collide with a key named "a1"
        if self.duplicate_separator.is_empty() {
            return Err(Error::Config(
                "duplicate_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
