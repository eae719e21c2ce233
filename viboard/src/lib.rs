/// Composition root and polling cycle
pub mod app;

/// Audio decoding, output channels and playback sessions
pub mod audio;

/// Global hotkeys
pub mod hotkey;

/// Key injection and push-to-talk
pub mod input;

/// Folder-backed soundboards
pub mod soundboard;

/// Persisted settings and the instance marker
pub mod state;

/// Utility modules
pub mod utils;
