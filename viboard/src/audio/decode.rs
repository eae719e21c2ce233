//! Clip decoders.
//!
//! Each decoder produces interleaved signed 16-bit PCM together with the
//! source sample rate and channel count. WAV files are read with `hound`,
//! MP3 files with `symphonia`.

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat as WavSampleFormat, WavReader};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::error::{AudioError, AudioResult};

/// Sample rate and channel layout of a decoded clip
///
/// Samples are always signed 16-bit, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl SoundFormat {
    /// Create a new format descriptor
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Whether the descriptor can drive an output stream
    pub fn is_playable(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

/// Which decoder produced a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    Wav,
    Mp3,
}

/// Output of a successful decode
#[derive(Debug)]
pub struct DecodedPcm {
    pub format: SoundFormat,
    pub samples: Vec<i16>,
    pub decoder: DecoderKind,
}

fn decode_error(path: &Path, reason: impl ToString) -> AudioError {
    AudioError::Decode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Decode a WAV file into 16-bit PCM
///
/// 8, 16, 24 and 32-bit integer and 32-bit float files are accepted; wider
/// integer formats are truncated to their top 16 bits.
pub fn decode_wav(path: &Path) -> AudioResult<DecodedPcm> {
    let reader = WavReader::open(path).map_err(|e| decode_error(path, e))?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(decode_error(path, "invalid WAV header"));
    }

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (WavSampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(path, e))?,
        (WavSampleFormat::Int, 8) => reader
            .into_samples::<i8>()
            .map(|s| s.map(|v| i16::from(v) << 8))
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(path, e))?,
        (WavSampleFormat::Int, bits @ (24 | 32)) => {
            let shift = u32::from(bits) - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_error(path, e))?
        }
        (WavSampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(f32_to_i16))
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(path, e))?,
        (format, bits) => {
            return Err(decode_error(
                path,
                format!("unsupported WAV encoding: {:?} {}-bit", format, bits),
            ));
        }
    };

    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "Decoded WAV"
    );

    Ok(DecodedPcm {
        format: SoundFormat::new(spec.sample_rate, spec.channels),
        samples,
        decoder: DecoderKind::Wav,
    })
}

/// Decode an MP3 file into 16-bit PCM
///
/// Corrupt frames are skipped; a file that yields no audio at all is an error.
pub fn decode_mp3(path: &Path) -> AudioResult<DecodedPcm> {
    let file = File::open(path).map_err(|e| decode_error(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(path, e))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .default_track()
        .ok_or_else(|| decode_error(path, "no audio track found"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, e))?;

    let mut samples = Vec::<i16>::new();
    let mut format: Option<SoundFormat> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let packet_format = SoundFormat::new(spec.rate, spec.channels.count() as u16);
                match format {
                    None => format = Some(packet_format),
                    Some(existing) if existing != packet_format => {
                        return Err(decode_error(path, "format changes mid-stream"));
                    }
                    Some(_) => {}
                }

                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = %path.display(), "Skipping corrupt MP3 frame: {}", e);
            }
            Err(e) => return Err(decode_error(path, e)),
        }
    }

    let format = format
        .filter(SoundFormat::is_playable)
        .ok_or_else(|| decode_error(path, "no decodable audio frames"))?;

    debug!(
        path = %path.display(),
        sample_rate = format.sample_rate,
        channels = format.channels,
        samples = samples.len(),
        "Decoded MP3"
    );

    Ok(DecodedPcm {
        format,
        samples,
        decoder: DecoderKind::Mp3,
    })
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}
