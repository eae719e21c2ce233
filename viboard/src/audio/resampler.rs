use crate::audio::decode::SoundFormat;
use crate::audio::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames handed to rubato per call
const CHUNK_FRAMES: usize = 1024;

/// Whole-clip sample rate converter
///
/// Converts a complete planar clip from one sample rate to another using
/// Sinc interpolation. Clips are short, so the whole buffer is processed in
/// one go when the clip is enqueued on a channel.
pub struct ClipResampler {
    /// The rubato resampler instance
    resampler: SincFixedIn<f32>,
    /// Input sample rate
    input_rate: u32,
    /// Output sample rate
    output_rate: u32,
    /// Number of planar channels
    channels: usize,
}

impl ClipResampler {
    /// Create a new clip resampler
    ///
    /// # Arguments
    /// * `input_rate` - Sample rate of the clip in Hz
    /// * `output_rate` - Sample rate of the output device in Hz
    /// * `channels` - Number of planar channels to convert
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if the resampler cannot be created.
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> AudioResult<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(AudioError::ResampleFailed(format!(
                "invalid conversion {} Hz -> {} Hz ({} channels)",
                input_rate, output_rate, channels
            )));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        debug!("Resample ratio: {:.6}", ratio);

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
            .map_err(|e| AudioError::ResampleFailed(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels,
        })
    }

    /// Convert a complete planar clip
    ///
    /// The resampler's delay is trimmed so the output starts on the first
    /// input frame, and the output length is `ceil(frames * ratio)`.
    pub fn process_all(&mut self, input: &[Vec<f32>]) -> AudioResult<Vec<Vec<f32>>> {
        if input.len() != self.channels {
            return Err(AudioError::ResampleFailed(format!(
                "Channel mismatch: expected {} channels, got {}",
                self.channels,
                input.len()
            )));
        }

        let frames = input.first().map_or(0, Vec::len);
        let expected =
            (frames as u64 * self.output_rate as u64).div_ceil(self.input_rate as u64) as usize;
        let delay = self.resampler.output_delay();

        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); self.channels];
        let mut position = 0;

        while frames - position >= self.resampler.input_frames_next() {
            let needed = self.resampler.input_frames_next();
            let chunk: Vec<&[f32]> = input
                .iter()
                .map(|channel| &channel[position..position + needed])
                .collect();
            let processed = self
                .resampler
                .process(chunk.as_slice(), None)
                .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;
            append_planar(&mut output, processed);
            position += needed;
        }

        if position < frames {
            let tail: Vec<&[f32]> = input.iter().map(|channel| &channel[position..]).collect();
            let processed = self
                .resampler
                .process_partial(Some(tail.as_slice()), None)
                .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;
            append_planar(&mut output, processed);
        }

        // Flush the interpolation delay line.
        while output[0].len() < expected + delay {
            let processed = self
                .resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;
            if processed[0].is_empty() {
                break;
            }
            append_planar(&mut output, processed);
        }

        for channel in &mut output {
            channel.drain(..delay.min(channel.len()));
            channel.truncate(expected);
        }

        debug!(
            "Resampled clip {} Hz -> {} Hz: {} -> {} frames",
            self.input_rate,
            self.output_rate,
            frames,
            output[0].len()
        );

        Ok(output)
    }
}

fn append_planar(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (channel, data) in output.iter_mut().zip(processed) {
        channel.extend(data);
    }
}

/// Split interleaved i16 samples into normalized planar f32 channels
pub fn to_planar(samples: &[i16], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(f32::from(sample) / 32768.0);
        }
    }
    planar
}

/// Map planar channels onto a different channel count
///
/// Downmixing to mono averages every channel, mono is duplicated to every
/// output channel, otherwise channels are copied by position and extra
/// output channels are silent.
pub fn remap_channels(planar: Vec<Vec<f32>>, target: usize) -> Vec<Vec<f32>> {
    let source = planar.len();
    if source == target || source == 0 {
        return planar;
    }

    let frames = planar[0].len();
    if target == 1 {
        let mut mono = vec![0.0f32; frames];
        for channel in &planar {
            for (out, sample) in mono.iter_mut().zip(channel) {
                *out += sample / source as f32;
            }
        }
        return vec![mono];
    }

    if source == 1 {
        return vec![planar[0].clone(); target];
    }

    (0..target)
        .map(|c| {
            planar
                .get(c)
                .cloned()
                .unwrap_or_else(|| vec![0.0f32; frames])
        })
        .collect()
}

/// Interleave planar channels
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map_or(0, Vec::len);
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for i in 0..frames {
        for channel in planar {
            interleaved.push(channel[i]);
        }
    }
    interleaved
}

/// Convert a decoded clip into interleaved f32 samples in the output format
pub fn convert_clip(
    samples: &[i16],
    source: SoundFormat,
    target: SoundFormat,
) -> AudioResult<Vec<f32>> {
    if !source.is_playable() || !target.is_playable() {
        return Err(AudioError::FormatRejected(format!(
            "cannot convert {:?} to {:?}",
            source, target
        )));
    }

    let planar = to_planar(samples, source.channels as usize);
    let planar = remap_channels(planar, target.channels as usize);

    let planar = if source.sample_rate == target.sample_rate {
        planar
    } else {
        ClipResampler::new(source.sample_rate, target.sample_rate, planar.len())?
            .process_all(&planar)?
    };

    Ok(interleave(&planar))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_planar_splits_frames() {
        let planar = to_planar(&[0, 16384, -32768, 0], 2);
        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0], vec![0.0, -1.0]);
        assert_eq!(planar[1], vec![0.5, 0.0]);
    }

    #[test]
    fn test_to_planar_drops_partial_frame() {
        let planar = to_planar(&[1, 2, 3], 2);
        assert_eq!(planar[0].len(), 1);
    }

    #[test]
    fn test_remap_mono_to_stereo() {
        let remapped = remap_channels(vec![vec![0.25, 0.5]], 2);
        assert_eq!(remapped, vec![vec![0.25, 0.5], vec![0.25, 0.5]]);
    }

    #[test]
    fn test_remap_stereo_to_mono_averages() {
        let remapped = remap_channels(vec![vec![1.0, 0.0], vec![0.0, 0.0]], 1);
        assert_eq!(remapped, vec![vec![0.5, 0.0]]);
    }

    #[test]
    fn test_remap_stereo_to_surround_pads_silence() {
        let remapped = remap_channels(vec![vec![0.1], vec![0.2]], 4);
        assert_eq!(remapped, vec![vec![0.1], vec![0.2], vec![0.0], vec![0.0]]);
    }

    #[test]
    fn test_interleave() {
        let interleaved = interleave(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(interleaved, vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_convert_same_rate_is_passthrough() {
        let out = convert_clip(
            &[16384, 16384],
            SoundFormat::new(48000, 1),
            SoundFormat::new(48000, 2),
        )
        .unwrap();
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_convert_resamples_length() {
        let samples = vec![0i16; 4410];
        let out = convert_clip(
            &samples,
            SoundFormat::new(44100, 1),
            SoundFormat::new(48000, 1),
        )
        .unwrap();
        assert_eq!(out.len(), 4800);
    }

    #[test]
    fn test_convert_rejects_zero_channels() {
        let result = convert_clip(&[0; 4], SoundFormat::new(44100, 0), SoundFormat::new(48000, 2));
        assert!(matches!(result, Err(AudioError::FormatRejected(_))));
    }

    #[test]
    fn test_resampler_invalid_rates() {
        assert!(ClipResampler::new(0, 48000, 1).is_err());
        assert!(ClipResampler::new(44100, 48000, 0).is_err());
    }
}
