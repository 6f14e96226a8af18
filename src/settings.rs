//! Persisted connection settings
//!
//! The only state that survives a restart: how to reach the node and which
//! xpub to derive contribution addresses from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// URL of the zcashd RPC service, e.g. `http://localhost:18232`
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    /// Extended BIP32 public key (optional)
    pub xpub: String,
}

#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the settings file, for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or return defaults if the file doesn't exist yet
    pub fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            log::debug!("No settings at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    /// Save settings to disk, creating the parent directory if needed
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        log::info!("Settings saved to {}", self.path.display());
        Ok(())
    }
}
