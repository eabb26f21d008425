// Settings module
// This module handles loading and saving the sound settings

pub mod settings;

pub use settings::SoundSettings;
