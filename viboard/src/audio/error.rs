use std::path::PathBuf;

use thiserror::Error;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// File extension is not one of the supported clip formats
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Decoder rejected the file or the file could not be read
    #[error("Error loading {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Soundboard folder could not be listed
    #[error("Unable to read folder {}: {reason}", path.display())]
    FolderUnreadable { path: PathBuf, reason: String },

    /// Gain value outside the accepted range
    #[error("Gain {0} is outside the range [0.0, 2.0]")]
    GainOutOfRange(f32),

    /// No audio output device found
    #[error("No audio output device found")]
    DeviceNotFound,

    /// Device index does not reference an enumerated device
    #[error("Device index {index} is out of range ({count} devices)")]
    DeviceIndexOutOfRange { index: usize, count: usize },

    /// Device name is invalid
    #[error("Device name is invalid UTF-8")]
    InvalidDeviceName,

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildFailed(String),

    /// Audio stream error
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Channel rejected the clip format
    #[error("Audio format rejected: {0}")]
    FormatRejected(String),

    /// Resampling failed
    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),
}

impl AudioError {
    /// Whether the error came from a file or persisted value rather than a device
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            AudioError::UnsupportedFormat(_)
                | AudioError::Decode { .. }
                | AudioError::FolderUnreadable { .. }
                | AudioError::GainOutOfRange(_)
        )
    }
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
