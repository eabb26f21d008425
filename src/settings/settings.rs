// Settings management and persistence
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sound::DEFAULT_PLAYERS;

/// Sound settings, stored as JSON in the app data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub version: i32, // Settings schema version for future migrations
    pub disable_notification_sound: bool,
    /// Only play notification sounds while the user is Available (or unknown)
    pub disable_notification_sound_if_not_available: bool,
    /// Output for notification and ring sounds, in `hw:<card>,<device>` form
    pub second_ring_device: Option<String>,
    /// Player commands to try, in order. Empty means the built-in list.
    pub players: Vec<String>,
    pub sounds_dir: PathBuf,
    pub log_level: String, // "error", "warn", "info", "debug" or "trace"
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            version: 1,
            disable_notification_sound: false,
            disable_notification_sound_if_not_available: false,
            second_ring_device: None,
            players: vec![],
            sounds_dir: PathBuf::from("assets/sounds"),
            log_level: "info".to_string(),
        }
    }
}

impl SoundSettings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("sound_settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            log::info!("No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        let settings: SoundSettings =
            serde_json::from_str(&content).context("Failed to parse settings")?;

        log::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        // Ensure directory exists
        fs::create_dir_all(app_dir).context("Failed to create settings directory")?;

        let path = Self::get_settings_path(app_dir);
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", path))?;

        log::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Player candidates in preference order
    pub fn player_candidates(&self) -> Vec<String> {
        if self.players.is_empty() {
            DEFAULT_PLAYERS.iter().map(|p| p.to_string()).collect()
        } else {
            self.players.clone()
        }
    }
}
