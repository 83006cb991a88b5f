//! Store configuration via `ironbox.toml`
//!
//! Everything has a default, so an empty file (or no file) is a valid
//! configuration.

use ironbox_core::{Error, Result};
use ironbox_sync::DEFAULT_MODEL_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "ironbox.toml";

/// Options passed to the core engine on open (`[engine]` table)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database directory; engine default if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Maximum database size in KiB; unlimited if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_db_size_kb: Option<u64>,
    /// Open without write access
    pub read_only: bool,
}

/// Store configuration loaded from `ironbox.toml`
///
/// # Example
///
/// ```toml
/// model_file = "ironbox-model.json"
///
/// [engine]
/// directory = "data"
/// max_db_size_kb = 1048576
/// read_only = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the model metadata file
    pub model_file: PathBuf,
    /// Core engine options
    pub engine: EngineConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_file: PathBuf::from(DEFAULT_MODEL_FILE),
            engine: EngineConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default config with the model file (and database) inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model_file: dir.join(DEFAULT_MODEL_FILE),
            engine: EngineConfig {
                directory: Some(dir.to_path_buf()),
                ..EngineConfig::default()
            },
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Ironbox store configuration
#
# Model metadata file. Keep it in version control next to the code that
# declares the model; it holds the IDs assigned to entities and properties.
model_file = "ironbox-model.json"

[engine]
# Database directory (engine default if unset)
# directory = "ironbox-db"

# Maximum database size in KiB (unlimited if unset)
# max_db_size_kb = 1048576

# Open without write access
read_only = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!("Failed to write config file '{}': {}", path.display(), e))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.model_file.as_os_str().is_empty() {
            return Err(Error::Config("model_file must not be empty".to_string()));
        }
        if self.engine.max_db_size_kb == Some(0) {
            return Err(Error::Config("engine.max_db_size_kb must be positive".to_string()));
        }
        Ok(())
    }
}
