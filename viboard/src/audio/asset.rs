//! Decoded sound clips.
//!
//! A [`SoundAsset`] is decoded once when it is loaded and owns its PCM buffer
//! until it is dropped. Dropping an asset also releases its hotkey binding.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::channel::OutputChannel;
use crate::audio::decode::{self, DecoderKind, SoundFormat};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::resampler::convert_clip;
use crate::hotkey::{HotkeyBinding, HotkeyId};

/// Number of per-sound gain override slots, one per playback slot
pub const GAIN_SLOTS: usize = 2;

/// Extensions accepted by [`SoundAsset::load`], compared case-insensitively
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Gain multiplier, always within [`Gain::MIN`, `Gain::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Gain(f32);

impl Gain {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 2.0;
    pub const UNITY: Gain = Gain(1.0);

    /// Validate a gain value
    ///
    /// # Errors
    /// Returns `AudioError::GainOutOfRange` for values outside [0.0, 2.0] and NaN.
    pub fn new(value: f32) -> AudioResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AudioError::GainOutOfRange(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::UNITY
    }
}

impl TryFrom<f32> for Gain {
    type Error = AudioError;

    fn try_from(value: f32) -> AudioResult<Self> {
        Self::new(value)
    }
}

impl From<Gain> for f32 {
    fn from(gain: Gain) -> f32 {
        gain.0
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Per-sound gain that replaces the playback slot gain when enabled
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GainOverride {
    pub gain: Gain,
    #[serde(rename = "use")]
    pub enabled: bool,
}

impl GainOverride {
    pub fn new(gain: Gain, enabled: bool) -> Self {
        Self { gain, enabled }
    }

    /// The override gain, if the override is active
    pub fn active(&self) -> Option<Gain> {
        self.enabled.then_some(self.gain)
    }
}

/// Process-unique identity of a loaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(u64);

impl SoundId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a path has one of the supported clip extensions
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// A decoded clip together with its per-slot gain overrides and hotkey
///
/// The sample buffer is fixed for the lifetime of the asset. Moving an asset
/// moves the buffer and the hotkey binding with it. Conversions to device
/// formats are kept next to the buffer and reused on every later play.
pub struct SoundAsset {
    id: SoundId,
    path: PathBuf,
    format: SoundFormat,
    decoder: DecoderKind,
    samples: Vec<i16>,
    converted: Mutex<Vec<(SoundFormat, Vec<f32>)>>,
    gains: [GainOverride; GAIN_SLOTS],
    hotkey: Option<HotkeyBinding>,
}

impl SoundAsset {
    /// Decode a clip file
    ///
    /// The decoder is chosen from the file extension alone.
    ///
    /// # Errors
    /// - `AudioError::UnsupportedFormat` if the extension is not `.wav` or `.mp3`
    /// - `AudioError::Decode` if the decoder rejects the file
    pub fn load(path: impl AsRef<Path>) -> AudioResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let decoded = match extension.as_str() {
            "wav" => decode::decode_wav(path)?,
            "mp3" => decode::decode_mp3(path)?,
            _ => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{} (expected .wav or .mp3)",
                    path.display()
                )));
            }
        };

        Ok(Self {
            id: SoundId::next(),
            path: path.to_path_buf(),
            format: decoded.format,
            decoder: decoded.decoder,
            samples: decoded.samples,
            converted: Mutex::new(Vec::new()),
            gains: [GainOverride::default(); GAIN_SLOTS],
            hotkey: None,
        })
    }

    /// Restart `channel` with this clip
    ///
    /// The channel's queue is cleared, its format switched to this clip's
    /// format and the gain override for `gain_slot` applied before the clip
    /// is queued and output resumed. Channels that play a fixed device format
    /// get the clip converted once per format.
    ///
    /// # Panics
    /// Panics if `gain_slot` is not below [`GAIN_SLOTS`].
    pub fn play(&self, channel: &mut dyn OutputChannel, gain_slot: usize) -> AudioResult<()> {
        assert!(gain_slot < GAIN_SLOTS, "gain slot {gain_slot} out of range");

        channel.pause();
        channel.clear();
        channel.set_format(self.format)?;
        channel.set_gain_override(self.gains[gain_slot].active());
        match channel.output_format() {
            Some(output) => self.enqueue_converted(channel, output)?,
            None => channel.enqueue(&self.samples)?,
        }
        channel.resume()?;

        debug!(
            sound = %self.path.display(),
            device = channel.device().0,
            samples = self.samples.len(),
            "Queued sound"
        );
        Ok(())
    }

    fn enqueue_converted(
        &self,
        channel: &mut dyn OutputChannel,
        output: SoundFormat,
    ) -> AudioResult<()> {
        let mut converted = self
            .converted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let index = match converted.iter().position(|(format, _)| *format == output) {
            Some(index) => index,
            None => {
                let samples = convert_clip(&self.samples, self.format, output)?;
                debug!(
                    sound = %self.path.display(),
                    sample_rate = output.sample_rate,
                    channels = output.channels,
                    "Converted sound for device format"
                );
                converted.push((output, samples));
                converted.len() - 1
            }
        };
        channel.enqueue_converted(&converted[index].1)
    }

    /// Number of device formats this clip has been converted to
    pub fn converted_formats(&self) -> usize {
        self.converted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name shown to the user
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn format(&self) -> SoundFormat {
        self.format
    }

    pub fn decoder(&self) -> DecoderKind {
        self.decoder
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Buffer length in bytes
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    /// # Panics
    /// Panics if `slot` is not below [`GAIN_SLOTS`].
    pub fn gain_override(&self, slot: usize) -> GainOverride {
        assert!(slot < GAIN_SLOTS, "gain slot {slot} out of range");
        self.gains[slot]
    }

    /// # Panics
    /// Panics if `slot` is not below [`GAIN_SLOTS`].
    pub fn set_gain_override(&mut self, slot: usize, gain: GainOverride) {
        assert!(slot < GAIN_SLOTS, "gain slot {slot} out of range");
        self.gains[slot] = gain;
    }

    pub fn gain_overrides(&self) -> &[GainOverride; GAIN_SLOTS] {
        &self.gains
    }

    /// Registry ID of the bound hotkey, [`HotkeyId::NULL`] if unbound
    pub fn hotkey(&self) -> HotkeyId {
        self.hotkey
            .as_ref()
            .map_or(HotkeyId::NULL, HotkeyBinding::id)
    }

    /// Attach a hotkey, releasing any previous one
    pub fn bind_hotkey(&mut self, binding: HotkeyBinding) {
        self.hotkey = Some(binding);
    }

    /// Release the bound hotkey, if any
    pub fn clear_hotkey(&mut self) {
        self.hotkey = None;
    }
}

impl fmt::Debug for SoundAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundAsset")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("format", &self.format)
            .field("decoder", &self.decoder)
            .field("samples", &self.samples.len())
            .field("gains", &self.gains)
            .field("hotkey", &self.hotkey())
            .finish()
    }
}
