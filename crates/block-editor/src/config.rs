use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse bridge config: {source}")]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
}

/// Timing of the deferred work around selection, blur and drag.
///
/// Every field has a default, so a TOML file only needs the values it
/// overrides:
///
/// ```toml
/// blur_grace_ms = 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Delay before reading the selection after pointer-up or select-all.
    pub selection_settle_ms: u64,
    /// Window after blur in which a toolbar action keeps the selection.
    pub blur_grace_ms: u64,
    /// Delay before a blurred block gives up the focused pointer.
    pub focus_release_ms: u64,
    /// Minimum spacing of drag-target samples while over the same block.
    pub drag_throttle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            selection_settle_ms: 10,
            blur_grace_ms: 150,
            focus_release_ms: 100,
            drag_throttle_ms: 100,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Loads the config at `path`; a missing file yields `None`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        Ok(Some(config))
    }

    pub fn selection_settle(&self) -> Duration {
        Duration::from_millis(self.selection_settle_ms)
    }

    pub fn blur_grace(&self) -> Duration {
        Duration::from_millis(self.blur_grace_ms)
    }

    pub fn focus_release(&self) -> Duration {
        Duration::from_millis(self.focus_release_ms)
    }

    pub fn drag_throttle(&self) -> Duration {
        Duration::from_millis(self.drag_throttle_ms)
    }
}
