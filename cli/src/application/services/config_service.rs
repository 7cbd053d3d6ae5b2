//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::WincloudConfig;

/// Load configuration; a missing file yields defaults.
pub fn load_config(store: &impl ConfigStore) -> Result<WincloudConfig> {
    store.load()
}

/// Save configuration.
pub fn save_config(store: &impl ConfigStore, config: &WincloudConfig) -> Result<()> {
    store.save(config)
}

/// Validate and persist one `key = value` setting. Nothing is written if
/// validation fails.
///
/// # Errors
///
/// Returns an error for unknown keys, invalid values, or store failures.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<WincloudConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    tracing::info!(key, value, "configuration updated");
    Ok(config)
}
