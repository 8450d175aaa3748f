// Server configuration loaded from TOML

use anyhow::{Context, Result};
use mercari_core::{MarketplaceConfig, SearchOrder, SearchSort, SearchStatus};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub marketplace: MarketplaceConfig,

    #[serde(default)]
    pub search: SearchSettings,
}

/// Fixed parameters applied to every `search_mercari_jp` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub sort: SearchSort,

    #[serde(default)]
    pub order: SearchOrder,

    #[serde(default)]
    pub status: SearchStatus,

    /// Terms excluded from every search on top of the caller's list.
    /// Empty unless configured.
    #[serde(default)]
    pub base_exclusions: Vec<String>,
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if !config_path.exists() {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context("Failed to read configuration file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }
}
