// Session settings and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::audio::session::{DEFAULT_BUFFER_CAPACITY, DEFAULT_LOW_WATER_MARGIN};
use crate::error::{Error, Result};

/// Tunables applied when a session is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub buffer_capacity: usize, // raised to 1024 if smaller
    pub low_water_margin: usize,
    pub volume_percent: i32, // clamped to 0-100 when applied
    pub force_mono: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            low_water_margin: DEFAULT_LOW_WATER_MARGIN,
            volume_percent: 100,
            force_mono: false,
        }
    }
}

impl SessionSettings {
    /// Get the settings file path
    pub fn get_settings_path(dir: &Path) -> PathBuf {
        dir.join("session.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(dir);

        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Settings(format!("Failed to read settings file: {}", e)))?;

        let settings: SessionSettings = serde_json::from_str(&content)
            .map_err(|e| Error::Settings(format!("Failed to parse settings: {}", e)))?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Settings(format!("Failed to create settings directory: {}", e)))?;

        let path = Self::get_settings_path(dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Settings(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&path, content)
            .map_err(|e| Error::Settings(format!("Failed to write settings file: {}", e)))?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}
