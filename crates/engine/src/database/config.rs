//! Store configuration via `approx-store.toml`
//!
//! A small TOML file next to the store controls fsync behaviour and what
//! happens when the store file already exists. Every field is optional.

use approx_store_core::{StoreError, StoreResult};
use approx_store_durability::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "approx-store.toml";

/// What `open` does with an existing store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExisting {
    /// Keep existing regions, add new ones after them
    Append,
    /// Discard the file's contents
    Truncate,
}

/// Store configuration.
///
/// # Example
///
/// ```toml
/// # "standard" (default) or "always"
/// durability = "standard"
///
/// # "append" (default) or "truncate"
/// on_existing = "append"
///
/// # commits between fsyncs in standard mode
/// # sync_batch = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Existing-file policy: `"append"` or `"truncate"`.
    #[serde(default = "default_on_existing_str")]
    pub on_existing: String,
    /// Commits between fsyncs in standard mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_batch: Option<usize>,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_on_existing_str() -> String {
    "append".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            on_existing: default_on_existing_str(),
            sync_batch: None,
        }
    }
}

impl StoreConfig {
    /// Config that fsyncs every commit.
    pub fn always() -> Self {
        Self {
            durability: "always".to_string(),
            ..Self::default()
        }
    }

    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the string is not `"standard"` or
    /// `"always"`, or `sync_batch` is zero.
    pub fn durability_mode(&self) -> StoreResult<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => match self.sync_batch {
                None => Ok(DurabilityMode::standard_default()),
                Some(0) => Err(StoreError::InvalidConfig(
                    "sync_batch must be at least 1".to_string(),
                )),
                Some(batch_size) => Ok(DurabilityMode::Standard { batch_size }),
            },
            "always" => Ok(DurabilityMode::Always),
            other => Err(StoreError::InvalidConfig(format!(
                "Invalid durability mode '{}'. Expected \"standard\" or \"always\".",
                other
            ))),
        }
    }

    /// Parse the existing-file policy.
    pub fn on_existing(&self) -> StoreResult<OnExisting> {
        match self.on_existing.as_str() {
            "append" => Ok(OnExisting::Append),
            "truncate" => Ok(OnExisting::Truncate),
            other => Err(StoreError::InvalidConfig(format!(
                "Invalid on_existing policy '{}'. Expected \"append\" or \"truncate\".",
                other
            ))),
        }
    }

    /// Check every field.
    pub fn validate(&self) -> StoreResult<()> {
        self.durability_mode()?;
        self.on_existing()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# approx-store configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = fsync every sync_batch commits and on close
#   "always"   = fsync every commit, no recorded row is lost on a crash
durability = "standard"

# What to do when the store file already exists: "append" (default) or "truncate"
on_existing = "append"

# Commits between fsyncs in standard mode (default: 1000)
# sync_batch = 1000
"#
    }

    /// Parse and validate config text.
    pub fn from_toml(content: &str) -> StoreResult<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| StoreError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            StoreError::InvalidConfig(msg) => {
                StoreError::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StoreError::storage_write(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::storage_write(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
