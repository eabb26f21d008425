// Handlers the shell registers for its IPC channels
use serde::{Deserialize, Serialize};

use crate::error::SoundError;
use crate::settings::SoundSettings;
use crate::state::AppState;

/// Payload of a `play-notification-sound` request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub audio: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Skip reasons are not failures for the caller
fn skipped(e: SoundError) -> Result<(), String> {
    log::debug!("No notification sound played: {}", e);
    Ok(())
}

pub fn play_notification_sound(
    request: NotificationRequest,
    state: &AppState,
) -> Result<(), String> {
    log::debug!(
        "Notification => Type: {}, Audio: {:?}, Title: {:?}, Body: {:?}",
        request.kind,
        request.audio,
        request.title,
        request.body
    );

    match state.notifications.play_notification(&request.kind) {
        Ok(_) => Ok(()),
        Err(e) => skipped(e),
    }
}

pub fn user_status_changed(status: i32, state: &AppState) -> Result<(), String> {
    state.notifications.set_user_status(status);
    Ok(())
}

pub fn incoming_call_started(state: &AppState) -> Result<(), String> {
    match state.notifications.start_ringing() {
        Ok(()) => Ok(()),
        Err(e) => skipped(e),
    }
}

pub fn incoming_call_ended(state: &AppState) -> Result<(), String> {
    state.notifications.stop_ringing();
    Ok(())
}

/// Silence every channel before the shell exits
pub fn app_will_quit(state: &AppState) -> Result<(), String> {
    state.notifications.stop_all();
    Ok(())
}

pub fn get_config(state: &AppState) -> Result<SoundSettings, String> {
    Ok(state.notifications.settings().clone())
}

/// Persist new settings. They take effect on the next start.
pub fn save_config(settings: SoundSettings, state: &AppState) -> Result<(), String> {
    settings
        .save(&state.app_dir)
        .map_err(|e| format!("Failed to save settings: {:#}", e))
}
