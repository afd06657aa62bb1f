//! Built-in defaults, the lowest precedence layer.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("coordination.namespace_root", "autopsy")?
        .set_default("coordination.lock_timeout_ms", 5_000_i64)?
        .set_default("coordination.lock_poll_interval_ms", 50_i64)?
        .set_default("journal.busy_timeout_ms", 5_000_i64)
}
