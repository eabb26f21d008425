// Chime - notification sound playback for the desktop shell
// Module declarations
pub mod commands;
pub mod error;
pub mod notifications;
pub mod settings;
pub mod sound;
pub mod state;

pub use error::SoundError;
pub use notifications::{NotificationController, SoundKind, UserStatus};
pub use settings::SoundSettings;
pub use state::AppState;

/// Install the global logger. `RUST_LOG` wins over `default_level`.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
