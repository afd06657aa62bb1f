//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::CaseCoordConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from defaults, the global file and environment.
    pub fn load() -> Result<CaseCoordConfig, ConfigError> {
        MergeService::load(None)
    }

    /// As [`ConfigLoader::load`], with `path` layered over the global file.
    pub fn load_with_file(path: &Path) -> Result<CaseCoordConfig, ConfigError> {
        MergeService::load(Some(path))
    }
}
