//! Configuration
//!
//! Layered configuration: built-in defaults, the global file
//! `$XDG_CONFIG_HOME/casecoord/config.toml`, an explicit `--config` file, then
//! `CASECOORD__SECTION__KEY` environment variables.

pub mod clusters;
pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use clusters::{ClusterBinding, ClusterEndpoint};
pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::coordination::DEFAULT_NAMESPACE_ROOT;
use crate::error::ApiError;
use crate::journal::JournalOptions;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseCoordConfig {
    #[serde(default)]
    pub coordination: CoordinationConfig,

    #[serde(default)]
    pub journal: JournalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordination substrate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_namespace_root")]
    pub namespace_root: String,

    /// Wait applied by commands that take locks
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,

    /// Data directories of known cluster endpoints
    #[serde(default)]
    pub clusters: Vec<ClusterBinding>,
}

fn default_namespace_root() -> String {
    DEFAULT_NAMESPACE_ROOT.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_lock_poll_interval_ms() -> u64 {
    50
}

impl CoordinationConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            namespace_root: default_namespace_root(),
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            clusters: Vec::new(),
        }
    }
}

/// Job journal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// SQLite database; None means `$XDG_DATA_HOME/casecoord/journal.db`
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl JournalConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(xdg::casecoord_data_dir()?.join("journal.db")),
        }
    }

    pub fn options(&self) -> JournalOptions {
        JournalOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}
