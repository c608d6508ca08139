//! Audio device handling and stream processing

use crate::config::CaptureMode;
use crate::constants::audio::{BUFFER_SIZE, PREFERRED_CHANNELS, PULL_RING_BYTES};
use crate::error::{AppError, AppResult};
use crate::pcm::{ByteOrder, SampleFormat, SampleType};
use crate::state::{MeterSnapshot, SharedMeter};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dialoguer::{Select, theme::ColorfulTheme};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Integer formats the level detector decodes, most preferred first
const FORMAT_PREFERENCE: [cpal::SampleFormat; 4] = [
    cpal::SampleFormat::I16,
    cpal::SampleFormat::U16,
    cpal::SampleFormat::I8,
    cpal::SampleFormat::U8,
];

/// Audio configuration and device information
pub struct AudioConfig {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: cpal::SampleFormat,
}

impl AudioConfig {
    /// Layout of the bytes this stream will deliver
    pub fn pcm_format(&self) -> SampleFormat {
        pcm_format(self.sample_format, self.channels)
    }

    pub fn stream_config(&self) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: BUFFER_SIZE,
        }
    }
}

/// Describe cpal's raw buffers, which are always in host byte order
pub fn pcm_format(sample_format: cpal::SampleFormat, channels: u16) -> SampleFormat {
    let sample_type = if sample_format.is_float() {
        SampleType::Float
    } else if sample_format.is_uint() {
        SampleType::Unsigned
    } else {
        SampleType::Signed
    };
    let bits = (sample_format.sample_size() * 8) as u16;

    SampleFormat::new(bits, sample_type, ByteOrder::native(), channels)
}

/// Position in the preference list; undecodable formats sort last
pub fn format_rank(sample_format: cpal::SampleFormat) -> usize {
    FORMAT_PREFERENCE
        .iter()
        .position(|preferred| *preferred == sample_format)
        .unwrap_or(FORMAT_PREFERENCE.len())
}

/// Use the preferred rate when the range allows it, otherwise the minimum
pub fn pick_sample_rate(min: u32, max: u32, preferred: u32) -> u32 {
    if min <= preferred && preferred <= max {
        preferred
    } else {
        min
    }
}

/// Find and configure an audio input device
pub fn setup_audio_device(
    device_name: Option<String>,
    preferred_rate: u32,
) -> AppResult<(cpal::Device, AudioConfig)> {
    let host = cpal::default_host();

    // Get input device
    let device = if let Some(name) = device_name {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AppError::AudioDevice(format!("Device \"{}\" not found", name)))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AppError::AudioDevice("No default input device available".to_string()))?
    };

    let device_name = device.name()?;

    let config_range = device
        .supported_input_configs()?
        .min_by_key(|range| {
            (
                format_rank(range.sample_format()),
                range.channels() != PREFERRED_CHANNELS,
                range.channels(),
            )
        })
        .ok_or_else(|| AppError::AudioDevice("No supported input configs found".to_string()))?;

    let sample_format = config_range.sample_format();
    if format_rank(sample_format) == FORMAT_PREFERENCE.len() {
        tracing::warn!(
            "{} offers no integer PCM format, using nearest ({:?}); levels will read as silence",
            device_name,
            sample_format
        );
    }

    let sample_rate = pick_sample_rate(
        config_range.min_sample_rate().0,
        config_range.max_sample_rate().0,
        preferred_rate,
    );

    let audio_config = AudioConfig {
        device_name,
        sample_rate,
        channels: config_range.channels(),
        sample_format,
    };

    tracing::info!(
        device = %audio_config.device_name,
        rate = audio_config.sample_rate,
        channels = audio_config.channels,
        format = ?audio_config.sample_format,
        "audio device configured"
    );

    Ok((device, audio_config))
}

/// Names of every available input device
pub fn list_input_devices() -> AppResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices()?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Let the user choose an input device; `None` when there are none
pub fn select_input_device() -> AppResult<Option<String>> {
    let mut device_list = list_input_devices()?;

    if device_list.is_empty() {
        return Ok(None);
    }

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an audio input device")
        .items(&device_list)
        .default(0)
        .interact()?;

    Ok(Some(device_list.swap_remove(selection)))
}

/// Device after `current` in `devices`, wrapping around. `None` when there
/// is nothing else to switch to.
pub fn next_device_name(devices: &[String], current: &str) -> Option<String> {
    let next = match devices.iter().position(|name| name == current) {
        Some(index) => &devices[(index + 1) % devices.len()],
        None => devices.first()?,
    };

    (next != current).then(|| next.clone())
}

/// Largest whole number of frames that fits in `chunk_bytes`, at least one frame
pub fn aligned_chunk_bytes(chunk_bytes: usize, frame_bytes: usize) -> usize {
    let frame_bytes = frame_bytes.max(1);
    (chunk_bytes - chunk_bytes % frame_bytes).max(frame_bytes)
}

/// Receiving side of pull mode: raw bytes waiting to be measured
pub struct PullQueue {
    consumer: HeapCons<u8>,
    chunk: Vec<u8>,
    frame_bytes: usize,
}

impl PullQueue {
    /// Process everything queued, one chunk at a time. Returns the number of
    /// chunks measured. When not `pulling`, whatever slipped into the queue
    /// around a mode switch is discarded instead.
    pub fn drain(
        &mut self,
        meter: &SharedMeter,
        pulling: bool,
        mut on_chunk: impl FnMut(&MeterSnapshot),
    ) -> usize {
        if !pulling {
            self.clear();
            return 0;
        }

        let mut processed = 0;

        loop {
            let available = self.consumer.occupied_len().min(self.chunk.len());
            let len = available - available % self.frame_bytes;
            if len == 0 {
                break;
            }

            let read = self.consumer.pop_slice(&mut self.chunk[..len]);
            if let Ok(snapshot) = meter.process(&self.chunk[..read]) {
                on_chunk(&snapshot);
                processed += 1;
            }
        }

        processed
    }

    /// Discard queued bytes
    pub fn clear(&mut self) -> usize {
        self.consumer.clear()
    }
}

/// Byte ring between the audio thread and the main loop
pub fn pull_channel(capacity: usize, chunk_bytes: usize, frame_bytes: usize) -> (HeapProd<u8>, PullQueue) {
    let (producer, consumer) = HeapRb::<u8>::new(capacity).split();
    let frame_bytes = frame_bytes.max(1);
    let queue = PullQueue {
        consumer,
        chunk: vec![0; aligned_chunk_bytes(chunk_bytes, frame_bytes)],
        frame_bytes,
    };

    (producer, queue)
}

/// Route one delivered buffer: measure it now (push) or queue it (pull).
/// A buffer that doesn't fit in the queue is dropped whole.
fn deliver(bytes: &[u8], meter: &SharedMeter, pull: &AtomicBool, producer: &mut HeapProd<u8>) {
    if pull.load(Ordering::Relaxed) {
        if producer.vacant_len() >= bytes.len() {
            producer.push_slice(bytes);
        } else {
            tracing::trace!(len = bytes.len(), "pull queue full, dropping buffer");
        }
    } else {
        let _ = meter.process(bytes);
    }
}

/// Audio processing callback that updates the shared meter
pub fn create_audio_callback(
    meter: SharedMeter,
    pull: Arc<AtomicBool>,
    mut producer: HeapProd<u8>,
) -> impl FnMut(&cpal::Data, &cpal::InputCallbackInfo) + Send + 'static {
    move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
        deliver(data.bytes(), &meter, &pull, &mut producer);
    }
}

/// Build a raw audio input stream with the given callback
pub fn build_audio_stream<F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    data_callback: F,
) -> AppResult<cpal::Stream>
where
    F: FnMut(&cpal::Data, &cpal::InputCallbackInfo) + Send + 'static,
{
    let stream = device.build_input_stream_raw(
        config,
        sample_format,
        data_callback,
        |err| tracing::error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// A running capture stream feeding a shared meter
pub struct Capture {
    stream: cpal::Stream,
    meter: SharedMeter,
    pull: Arc<AtomicBool>,
    queue: PullQueue,
}

impl Capture {
    /// Open the stream and start delivering buffers in `mode`
    pub fn start(
        device: &cpal::Device,
        audio_config: &AudioConfig,
        meter: SharedMeter,
        mode: CaptureMode,
        chunk_bytes: usize,
    ) -> AppResult<Self> {
        let (producer, queue) = pull_channel(PULL_RING_BYTES, chunk_bytes, meter.format().frame_bytes());
        let pull = Arc::new(AtomicBool::new(mode == CaptureMode::Pull));

        let callback = create_audio_callback(meter.clone(), Arc::clone(&pull), producer);
        let stream = build_audio_stream(
            device,
            &audio_config.stream_config(),
            audio_config.sample_format,
            callback,
        )?;
        stream.play()?;

        Ok(Self {
            stream,
            meter,
            pull,
            queue,
        })
    }

    pub fn mode(&self) -> CaptureMode {
        if self.pull.load(Ordering::Relaxed) {
            CaptureMode::Pull
        } else {
            CaptureMode::Push
        }
    }

    /// Switch delivery mode. Bytes queued under the old mode are discarded.
    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.pull.store(mode == CaptureMode::Pull, Ordering::Relaxed);
        let discarded = self.queue.clear();
        tracing::info!(%mode, discarded, "capture mode changed");
    }

    /// Measure queued bytes in pull mode; in push mode stray bytes are dropped
    pub fn drain(&mut self, on_chunk: impl FnMut(&MeterSnapshot)) -> usize {
        let pulling = self.pull.load(Ordering::Relaxed);
        self.queue.drain(&self.meter, pulling, on_chunk)
    }

    pub fn suspend(&self) -> AppResult<()> {
        self.stream.pause()?;
        tracing::info!("capture suspended");
        Ok(())
    }

    pub fn resume(&self) -> AppResult<()> {
        self.stream.play()?;
        tracing::info!("capture resumed");
        Ok(())
    }
}
