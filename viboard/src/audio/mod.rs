/// Decoded sound clips and gain overrides
pub mod asset;

/// Output channels
pub mod channel;

/// WAV and MP3 decoding
pub mod decode;

/// Output device enumeration and hot-plug detection
pub mod device;

/// Audio-related error types
pub mod error;

/// Sample rate and channel layout conversion
pub mod resampler;

/// Output slots and fan-out playback
pub mod session;

// Re-export commonly used types
pub use asset::{Gain, GainOverride, SoundAsset, SoundId, GAIN_SLOTS, is_supported};
pub use channel::{CpalChannel, OutputChannel};
pub use decode::{DecoderKind, SoundFormat};
pub use device::{CpalBackend, DeviceEvent, DeviceId, DeviceInfo, DeviceWatcher, OutputBackend};
pub use error::{AudioError, AudioResult};
pub use session::{PlayReport, PlaybackConfig, PlaybackSessionManager, OUTPUT_SLOTS};
