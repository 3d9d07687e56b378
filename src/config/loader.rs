//! Layered configuration loading

use super::sources;
use super::IndexConfig;
use crate::error::ApiError;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Precedence, lowest to highest: built-in defaults, the global file, the
    /// explicit file (when given), then `FSINDEX__*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<IndexConfig, ApiError> {
        let builder = sources::defaults()?;
        let builder = sources::add_global_file(builder)?;
        let builder = match explicit {
            Some(path) => sources::add_explicit_file(builder, path)?,
            None => builder,
        };
        let builder = sources::add_environment(builder)?;

        let config: IndexConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(explicit = ?explicit, "Configuration loaded");
        Ok(config)
    }

    /// Load a single file over the defaults, ignoring the global file and the
    /// environment
    pub fn load_from_file(path: &Path) -> Result<IndexConfig, ApiError> {
        let builder = sources::defaults()?;
        let builder = sources::add_explicit_file(builder, path)?;
        let config: IndexConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
