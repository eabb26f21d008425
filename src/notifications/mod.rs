// Notification layer
// Maps notification types to sound files and decides whether to play them

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::runtime::Handle;

use crate::error::SoundError;
use crate::settings::SoundSettings;
use crate::sound::{get_first_installed, Completion, PlayOptions, ProcessPlayer, SoundPlayer};

/// Notification sound types the web client asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundKind {
    NewMessage,
    MeetingStarted,
    IncomingCall,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [
        SoundKind::NewMessage,
        SoundKind::MeetingStarted,
        SoundKind::IncomingCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::NewMessage => "new-message",
            SoundKind::MeetingStarted => "meeting-started",
            SoundKind::IncomingCall => "incoming-call",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            SoundKind::NewMessage => "new_message.wav",
            SoundKind::MeetingStarted => "meeting_started.wav",
            SoundKind::IncomingCall => "incoming_call.wav",
        }
    }
}

impl FromStr for SoundKind {
    type Err = SoundError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| SoundError::UnknownSound(value.to_string()))
    }
}

/// Presence reported by the web client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Unknown,
    Available,
    /// Busy, away, do-not-disturb and the rest
    Other(i32),
}

impl UserStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => UserStatus::Unknown,
            1 => UserStatus::Available,
            other => UserStatus::Other(other),
        }
    }

    fn allows_sound(&self) -> bool {
        matches!(self, UserStatus::Unknown | UserStatus::Available)
    }
}

/// Owns the notification and ring channels
pub struct NotificationController {
    settings: SoundSettings,
    player: Option<Box<dyn SoundPlayer>>,
    ringer: Option<Box<dyn SoundPlayer>>,
    status: Mutex<UserStatus>,
}

impl NotificationController {
    /// Pick the first installed player and set up both channels with it.
    pub fn from_settings(settings: SoundSettings, runtime: Handle) -> Self {
        let candidates = settings.player_candidates();
        match get_first_installed(&candidates) {
            Some(command) => {
                log::info!("Using {} for notification sounds", command);
                let player = ProcessPlayer::new(command.clone(), runtime.clone());
                let ringer = ProcessPlayer::new(command, runtime);
                Self::with_players(settings, Some(Box::new(player)), Some(Box::new(ringer)))
            }
            None => {
                log::info!("No audio players found. Audio notifications might not work.");
                Self::with_players(settings, None, None)
            }
        }
    }

    pub fn with_players(
        settings: SoundSettings,
        player: Option<Box<dyn SoundPlayer>>,
        ringer: Option<Box<dyn SoundPlayer>>,
    ) -> Self {
        Self {
            settings,
            player,
            ringer,
            status: Mutex::new(UserStatus::Unknown),
        }
    }

    pub fn settings(&self) -> &SoundSettings {
        &self.settings
    }

    pub fn player_command(&self) -> Option<&str> {
        self.player.as_ref().map(|p| p.command())
    }

    pub fn set_user_status(&self, code: i32) {
        let status = UserStatus::from_code(code);
        log::debug!("User status changed to {:?}", status);
        *self.status.lock() = status;
    }

    pub fn user_status(&self) -> UserStatus {
        *self.status.lock()
    }

    pub fn sound_file(&self, kind: SoundKind) -> PathBuf {
        self.settings.sounds_dir.join(kind.file_name())
    }

    fn options(&self) -> PlayOptions {
        PlayOptions {
            device: self.settings.second_ring_device.clone(),
            callback: None,
        }
    }

    fn check_enabled(&self) -> Result<(), SoundError> {
        if self.settings.disable_notification_sound {
            return Err(SoundError::Disabled);
        }

        let status = self.user_status();
        if self.settings.disable_notification_sound_if_not_available && !status.allows_sound() {
            return Err(SoundError::SuppressedByStatus(status));
        }

        Ok(())
    }

    /// Play the sound registered for `kind` (e.g. "new-message").
    pub fn play_notification(&self, kind: &str) -> Result<Completion, SoundError> {
        let player = self.player.as_ref().ok_or(SoundError::NoPlayer)?;
        self.check_enabled()?;

        let kind: SoundKind = kind.parse()?;
        let file = self.sound_file(kind);

        log::debug!("Playing file: {:?}", file);
        Ok(player.play(&file, self.options()))
    }

    /// Start looping the incoming call sound on the ring channel.
    pub fn start_ringing(&self) -> Result<(), SoundError> {
        let ringer = self.ringer.as_ref().ok_or(SoundError::NoPlayer)?;
        self.check_enabled()?;

        let file = self.sound_file(SoundKind::IncomingCall);
        log::debug!("Ringing with {:?}", file);
        ringer.loop_play(&file, self.options());
        Ok(())
    }

    pub fn stop_ringing(&self) {
        if let Some(ringer) = &self.ringer {
            ringer.stop();
        }
    }

    /// True while a ring loop is active, including the gap between cycles
    pub fn is_ringing(&self) -> bool {
        self.ringer.as_ref().is_some_and(|r| r.is_looping())
    }

    /// Silence both channels
    pub fn stop_all(&self) {
        if let Some(player) = &self.player {
            player.stop();
        }
        self.stop_ringing();
    }
}

/// Absolute sound directory for an app installed at `app_path`
pub fn sounds_dir_for(app_path: &Path, settings: &SoundSettings) -> PathBuf {
    if settings.sounds_dir.is_absolute() {
        settings.sounds_dir.clone()
    } else {
        app_path.join(&settings.sounds_dir)
    }
}
