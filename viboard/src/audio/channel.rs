use crate::audio::asset::Gain;
use crate::audio::decode::SoundFormat;
use crate::audio::device::{DeviceId, DeviceInfo};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::resampler::convert_clip;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, error, info};

/// One open connection to an output device
///
/// A channel plays a single queue of samples. Queuing a new clip is always
/// preceded by [`OutputChannel::clear`], so clips never overlap on one channel.
pub trait OutputChannel {
    /// Device the channel is connected to
    fn device(&self) -> DeviceId;

    /// Stop draining the queue; queued samples are kept
    fn pause(&mut self);

    /// Drop every queued sample
    fn clear(&mut self);

    /// Format of the samples passed to the next [`OutputChannel::enqueue`]
    fn set_format(&mut self, format: SoundFormat) -> AudioResult<()>;

    /// Slot gain, used whenever no override is active
    fn set_gain(&mut self, gain: Gain);

    /// Per-sound gain replacing the slot gain until the next override change
    fn set_gain_override(&mut self, gain: Option<Gain>);

    /// Append interleaved 16-bit samples in the current format
    fn enqueue(&mut self, samples: &[i16]) -> AudioResult<()>;

    /// Format the device plays, if the channel accepts pre-converted audio
    ///
    /// Channels returning `Some` take samples already in that format through
    /// [`OutputChannel::enqueue_converted`].
    fn output_format(&self) -> Option<SoundFormat> {
        None
    }

    /// Append interleaved float samples already in [`OutputChannel::output_format`]
    fn enqueue_converted(&mut self, _samples: &[f32]) -> AudioResult<()> {
        Err(AudioError::FormatRejected(
            "channel does not accept converted audio".to_string(),
        ))
    }

    /// Resume draining the queue
    fn resume(&mut self) -> AudioResult<()>;

    /// Samples still waiting to reach the device
    fn queued(&self) -> usize;

    /// Whether the underlying stream has died and the channel must be reopened
    fn is_failed(&self) -> bool {
        false
    }

    /// Whether the device still has undelivered audio
    ///
    /// A failed channel never counts as active.
    fn is_active(&self) -> bool {
        !self.is_failed() && self.queued() > 0
    }
}

/// State shared between a channel and its output callback
#[derive(Debug)]
pub(crate) struct SharedQueue {
    samples: VecDeque<f32>,
    gain: f32,
    paused: bool,
    failed: Option<String>,
}

impl SharedQueue {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            gain: 1.0,
            paused: true,
            failed: None,
        }
    }
}

fn lock(shared: &Mutex<SharedQueue>) -> MutexGuard<'_, SharedQueue> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fill one device buffer from the shared queue
///
/// Never blocks: if the queue is locked by the polling thread the buffer is
/// filled with silence and the samples are delivered on the next callback.
fn write_output<T>(data: &mut [T], shared: &Mutex<SharedQueue>)
where
    T: SizedSample + FromSample<f32>,
{
    let mut queue = match shared.try_lock() {
        Ok(queue) => queue,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            data.fill(T::EQUILIBRIUM);
            return;
        }
    };

    if queue.paused {
        data.fill(T::EQUILIBRIUM);
        return;
    }

    let gain = queue.gain;
    for out in data.iter_mut() {
        *out = match queue.samples.pop_front() {
            Some(sample) => T::from_sample((sample * gain).clamp(-1.0, 1.0)),
            None => T::EQUILIBRIUM,
        };
    }
}

/// Output channel backed by a cpal stream
///
/// The stream is opened in the device's default configuration. Clips are
/// converted to that configuration when they are queued.
pub struct CpalChannel {
    /// Device identity in the session's device list
    device: DeviceId,
    /// Device name, for logging
    name: String,
    /// The cpal output stream, closed on drop
    _stream: Stream,
    /// Format the device plays
    output: SoundFormat,
    /// Format of the samples passed to `enqueue`
    source: Option<SoundFormat>,
    slot_gain: Gain,
    gain_override: Option<Gain>,
    shared: Arc<Mutex<SharedQueue>>,
}

impl CpalChannel {
    /// Open an output stream on `device`
    ///
    /// # Errors
    /// - `AudioError::DefaultConfigError` if the device has no output config
    /// - `AudioError::StreamBuildFailed` if the stream cannot be built or the
    ///   sample format is not supported
    pub fn open(device: &Device, info: &DeviceInfo) -> AudioResult<Self> {
        let config = device.default_output_config()?;
        let sample_format = config.sample_format();
        let stream_config = StreamConfig {
            channels: config.channels(),
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let output = SoundFormat::new(stream_config.sample_rate.0, stream_config.channels);

        let shared = Arc::new(Mutex::new(SharedQueue::new()));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, &stream_config, &shared, &info.name),
            SampleFormat::I16 => build_stream::<i16>(device, &stream_config, &shared, &info.name),
            SampleFormat::U16 => build_stream::<u16>(device, &stream_config, &shared, &info.name),
            SampleFormat::I32 => build_stream::<i32>(device, &stream_config, &shared, &info.name),
            other => Err(AudioError::StreamBuildFailed(format!(
                "unsupported sample format {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        info!(
            "Opened output device {} ({} Hz, {} channels, {:?})",
            info.name, output.sample_rate, output.channels, sample_format
        );

        Ok(Self {
            device: info.id,
            name: info.name.clone(),
            _stream: stream,
            output,
            source: None,
            slot_gain: Gain::UNITY,
            gain_override: None,
            shared,
        })
    }

    fn push_samples(&mut self, samples: impl IntoIterator<Item = f32>) -> AudioResult<()> {
        let mut queue = lock(&self.shared);
        if let Some(reason) = &queue.failed {
            return Err(AudioError::StreamError(reason.clone()));
        }
        queue.samples.extend(samples);
        debug!("{} samples queued on {}", queue.samples.len(), self.name);
        Ok(())
    }

    fn apply_gain(&mut self) {
        let effective = self.gain_override.unwrap_or(self.slot_gain);
        lock(&self.shared).gain = effective.get();
    }
}

/// Stop a dead stream: drop its queue so nothing waits on it any more
fn mark_failed(shared: &Mutex<SharedQueue>, reason: String) {
    let mut queue = lock(shared);
    queue.samples.clear();
    queue.paused = true;
    queue.failed = Some(reason);
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    shared: &Arc<Mutex<SharedQueue>>,
    name: &str,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let callback_queue = Arc::clone(shared);
    let error_queue = Arc::clone(shared);
    let device_name = name.to_string();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                write_output(data, &callback_queue);
            },
            move |err| {
                error!("Audio stream error on {}: {}", device_name, err);
                mark_failed(&error_queue, err.to_string());
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
}

impl OutputChannel for CpalChannel {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn pause(&mut self) {
        lock(&self.shared).paused = true;
    }

    fn clear(&mut self) {
        lock(&self.shared).samples.clear();
    }

    fn set_format(&mut self, format: SoundFormat) -> AudioResult<()> {
        if !format.is_playable() {
            return Err(AudioError::FormatRejected(format!(
                "{} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }
        self.source = Some(format);
        Ok(())
    }

    fn set_gain(&mut self, gain: Gain) {
        self.slot_gain = gain;
        self.apply_gain();
    }

    fn set_gain_override(&mut self, gain: Option<Gain>) {
        self.gain_override = gain;
        self.apply_gain();
    }

    fn enqueue(&mut self, samples: &[i16]) -> AudioResult<()> {
        let source = self
            .source
            .ok_or_else(|| AudioError::FormatRejected("no format set".to_string()))?;
        let converted = convert_clip(samples, source, self.output)?;
        self.push_samples(converted)
    }

    fn output_format(&self) -> Option<SoundFormat> {
        Some(self.output)
    }

    fn enqueue_converted(&mut self, samples: &[f32]) -> AudioResult<()> {
        self.push_samples(samples.iter().copied())
    }

    fn resume(&mut self) -> AudioResult<()> {
        let mut queue = lock(&self.shared);
        if let Some(reason) = &queue.failed {
            return Err(AudioError::StreamError(reason.clone()));
        }
        queue.paused = false;
        Ok(())
    }

    fn queued(&self) -> usize {
        let queue = lock(&self.shared);
        if queue.failed.is_some() {
            0
        } else {
            queue.samples.len()
        }
    }

    fn is_failed(&self) -> bool {
        lock(&self.shared).failed.is_some()
    }
}

impl Drop for CpalChannel {
    fn drop(&mut self) {
        info!("Closing output device {}", self.name);
    }
}
