// Application state management
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::notifications::{sounds_dir_for, NotificationController};
use crate::settings::SoundSettings;

pub struct AppState {
    pub notifications: Arc<NotificationController>,
    pub app_dir: PathBuf,
}

impl AppState {
    pub fn new(notifications: NotificationController, app_dir: PathBuf) -> Self {
        Self {
            notifications: Arc::new(notifications),
            app_dir,
        }
    }

    /// Load settings from `app_dir` and set up the sound channels.
    /// Relative sound directories are taken from `app_path`.
    pub fn load(app_dir: &Path, app_path: &Path, runtime: Handle) -> Result<Self> {
        let mut settings = SoundSettings::load(app_dir)?;
        settings.sounds_dir = sounds_dir_for(app_path, &settings);

        let notifications = NotificationController::from_settings(settings, runtime);
        Ok(Self::new(notifications, app_dir.to_path_buf()))
    }
}
