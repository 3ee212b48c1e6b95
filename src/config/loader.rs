use super::SyncConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Read a settings file and apply environment overrides
///
/// Without a path, defaults plus environment overrides are used. Callers
/// validate after applying their own overrides.
pub async fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = SyncConfig::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            tracing::debug!(path = %path.display(), "Loaded configuration");
            config
        }
        None => SyncConfig::new(),
    };

    config.merge_env_vars();
    Ok(config)
}
