//! Store configuration
//!
//! Stored as pretty JSON, e.g.
//! ```json
//! { "backend": "filesystem", "base_dir": "/home/me/.local/share/verso", "delete_on_exit": false }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which backend pair a [`Database`](crate::Database) is built on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `objects/` and `attachments/` directories under `base_dir`
    #[default]
    Filesystem,
    /// Process memory; nothing survives the `Database`
    Memory,
}

/// Settings used by [`Database::open`](crate::Database::open)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory of the filesystem backend
    #[serde(default = "fallback_base_dir")]
    pub base_dir: PathBuf,

    /// Remove all stored data when the store is closed
    #[serde(default)]
    pub delete_on_exit: bool,
}

impl StoreConfig {
    /// Filesystem store rooted at `base_dir`
    pub fn filesystem(base_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            backend: BackendKind::Filesystem,
            base_dir: base_dir.into(),
            delete_on_exit: false,
        }
    }

    /// In-memory store
    pub fn memory() -> Self {
        StoreConfig {
            backend: BackendKind::Memory,
            base_dir: fallback_base_dir(),
            delete_on_exit: false,
        }
    }

    pub fn with_delete_on_exit(mut self, delete_on_exit: bool) -> Self {
        self.delete_on_exit = delete_on_exit;
        self
    }

    /// Platform data directory for stores (`~/.local/share/verso` on Linux)
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("verso"))
            .ok_or_else(|| Error::Config("Could not find data directory".into()))
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::filesystem(fallback_base_dir())
    }
}

fn fallback_base_dir() -> PathBuf {
    StoreConfig::default_base_dir().unwrap_or_else(|_| PathBuf::from(".verso"))
}
