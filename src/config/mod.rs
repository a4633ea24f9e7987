use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export section types
pub use crate::connection::ConnectionConfig;
pub use crate::mapping::MappingConfig;
pub use crate::pool::PoolConfig;
pub use crate::reconcile::ReconcileConfig;

/// Complete Junction configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JunctionConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Load configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<JunctionConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: JunctionConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
