//! Configuration management
//!
//! Settings are layered: built-in defaults, then an optional JSON config file,
//! then `REGISTRY_GC_*` environment variables, then command line flags.

use crate::error::{GcError, Result};
use crate::gc::GcOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT_DIRECTORY: &str = "/var/lib/registry";

pub const ENV_ROOT: &str = "REGISTRY_GC_ROOT";
pub const ENV_DRY_RUN: &str = "REGISTRY_GC_DRY_RUN";
pub const ENV_DELETE_UNTAGGED: &str = "REGISTRY_GC_DELETE_UNTAGGED";
pub const ENV_VERBOSE: &str = "REGISTRY_GC_VERBOSE";

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the filesystem driver stores registry content under
    pub root_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::from(DEFAULT_ROOT_DIRECTORY),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    pub storage: StorageConfig,
    pub dry_run: bool,
    pub remove_untagged: bool,
    pub verbose: bool,
    pub quiet: bool,
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(GcError::Configuration(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

impl GcConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GcError::Configuration(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GcError::Configuration(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT) {
            self.storage.root_directory = PathBuf::from(root);
        }
        if let Some(value) = lookup(ENV_DRY_RUN) {
            self.dry_run = parse_bool(ENV_DRY_RUN, &value)?;
        }
        if let Some(value) = lookup(ENV_DELETE_UNTAGGED) {
            self.remove_untagged = parse_bool(ENV_DELETE_UNTAGGED, &value)?;
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            self.verbose = parse_bool(ENV_VERBOSE, &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.root_directory.as_os_str().is_empty() {
            return Err(GcError::Configuration(
                "Storage root directory cannot be empty".to_string(),
            ));
        }
        if self.verbose && self.quiet {
            return Err(GcError::Configuration(
                "verbose and quiet output cannot both be enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> GcOptions {
        GcOptions {
            dry_run: self.dry_run,
            remove_untagged: self.remove_untagged,
        }
    }
}
