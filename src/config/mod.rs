//! Configuration module for meshflow
//!
//! The engine reads one [`EngineConfig`] at start-up. Files ending in
//! `.toml` are parsed as TOML, anything else as JSON. Every field has a
//! default, so partial files are accepted.
//!
//! # Default Location
//!
//! - **Linux**: `~/.config/meshflow/engine.toml`
//! - **macOS**: `~/Library/Application Support/meshflow/engine.toml`
//! - **Windows**: `%APPDATA%\meshflow\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use meshflow::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default("engine.toml");
//! let (ctx, bridge) = EngineContext::new(config.execution.clone());
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for the config directory
pub const APP_ID: &str = "meshflow";

/// Default config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Default location of the engine config, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub execution: ExecutionSettings,
    pub time_loop: TimeLoopSettings,
    pub compositing: CompositingSettings,
    pub logging: LoggingSettings,
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

impl EngineConfig {
    /// Load from `path`, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                FlowError::Config(format!("Failed to parse config {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                FlowError::Config(format!("Failed to parse config {:?}: {}", path, e))
            })
        }
    }

    /// Load from `path`, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to `path`, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> FlowResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FlowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| FlowError::Serialization(format!("Failed to serialize config: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .map_err(|e| FlowError::Config(format!("Failed to write config {:?}: {}", path, e)))?;

        tracing::info!("Saved engine config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.execution.streaming);
        assert_eq!(config.time_loop.stride, 1);
        assert_eq!(config.compositing.topology, TopologyKind::BinaryTree);
    }

    #[test]
    fn test_save_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.toml");

        let mut config = EngineConfig::default();
        config.time_loop.end = Some(9);
        config.compositing.topology = TopologyKind::Linear;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.compositing.background = [0.25, 0.5, 1.0];
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[time_loop]\nstride = 3\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.time_loop.stride, 3);
        assert_eq!(config.time_loop.start, 0);
        assert!(config.execution.streaming);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }
}
