//! Configuration
//!
//! `IndexConfig` is the whole configuration surface: where the store lives, how
//! long to wait on a locked store, the metadata columns and tag vocabulary a new
//! store starts with, default ingestion options and logging. Every field has a
//! default, so an empty configuration is valid.

mod loader;
mod sources;

pub use loader::ConfigLoader;

use crate::error::ApiError;
use crate::ingest::IngestOptions;
use crate::logging::LoggingConfig;
use crate::metadata::MetadataSchema;
use crate::store::RetryPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the store when no path is configured
pub const DEFAULT_STORE_FILE: &str = "index.sqlite";

/// Platform directories for this crate
pub(crate) fn project_dirs() -> Result<ProjectDirs, ApiError> {
    ProjectDirs::from("", "", "fsindex").ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform directories".to_string())
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub store: StoreConfig,

    /// Metadata columns created with a new store
    #[serde(default)]
    pub metadata: MetadataSchema,

    /// Tags created with a new store
    #[serde(default)]
    pub tags: Vec<String>,

    /// Defaults for ingestion batches
    #[serde(default)]
    pub ingest: IngestOptions,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        self.metadata.validate()?;
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ApiError::ConfigError("Tag names must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Store location and contention settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file; `None` means `<data dir>/index.sqlite`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Delay between attempts while another process holds the store lock
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl StoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_delay_ms))
    }

    /// Configured store path, or the default under the platform data directory
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Ok(project_dirs()?.data_dir().join(DEFAULT_STORE_FILE)),
        }
    }
}
