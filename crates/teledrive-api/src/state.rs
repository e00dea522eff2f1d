//! Application state for CLI commands.

use std::path::Path;

use anyhow::Context;

use teledrive_core::storage::StorageManager;
use teledrive_infra::bootstrap::build_storage_manager;
use teledrive_types::config::AppConfig;

/// Loaded configuration plus the storage manager built from it.
pub struct AppState {
    pub config: AppConfig,
    pub manager: StorageManager,
}

impl AppState {
    /// Wire the manager from an already loaded configuration.
    pub fn init(config: AppConfig) -> anyhow::Result<Self> {
        let manager =
            build_storage_manager(&config).context("failed to build storage manager")?;
        Ok(Self { config, manager })
    }
}

/// Load configuration, applying the CLI verbosity override to the log level.
pub async fn load(path: Option<&Path>, log_level: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut config = teledrive_infra::config::load_config(path)
        .await
        .with_context(|| match path {
            Some(p) => format!("failed to load config from {}", p.display()),
            None => "failed to load config".to_string(),
        })?;
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    Ok(config)
}
