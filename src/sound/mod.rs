// Notification sound playback
// Player discovery, output device resolution and external process playback

pub mod devices;
pub mod discovery;
pub mod player;

// Re-exports for convenience
pub use devices::{resolve_device, DeviceResolver, PlayerFamily};
pub use discovery::{get_first_installed, is_installed, DEFAULT_PLAYERS};
pub use player::{Completion, PlayOptions, PlaybackOutcome, ProcessPlayer, SoundPlayer};
