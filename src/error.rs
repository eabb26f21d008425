use thiserror::Error;

use crate::notifications::UserStatus;

/// Reasons a notification sound was not played
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    #[error("notification sounds are disabled")]
    Disabled,
    #[error("notification sounds are suppressed while status is {0:?}")]
    SuppressedByStatus(UserStatus),
    #[error("no audio player installed")]
    NoPlayer,
    #[error("no sound registered for {0:?}")]
    UnknownSound(String),
}
