//! Environment variable source: CASECOORD__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
///
/// `CASECOORD__COORDINATION__LOCK_TIMEOUT_MS=100` sets `coordination.lock_timeout_ms`.
/// The single-underscore `CASECOORD_LOG*` variables belong to logging and are not matched.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("CASECOORD")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
