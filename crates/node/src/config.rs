// Path: crates/node/src/config.rs
use fleet_types::config::NodeConfig;
use fleet_types::error::ConfigError;
use std::path::Path;

/// Parses and validates a `fleet.toml` document.
pub fn parse(raw: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates the config file at `path`.
pub fn load(path: &Path) -> Result<NodeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse(&raw)
}
