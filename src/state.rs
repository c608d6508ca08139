//! Application state management

use crate::config::CaptureMode;
use crate::pcm::{PcmError, PeakLevelDetector, SampleFormat};
use crate::smoothing::LevelSmoother;
use std::sync::{Arc, Mutex, MutexGuard};

/// Copy of the meter readings handed to the display
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeterSnapshot {
    /// Peak level of the most recent buffer, in `[0, 1]`
    pub level: f32,
    /// Smoothed level as a percentage
    pub scaled_mean: f32,
    /// Highest smoothed percentage since the last reset
    pub running_max: f32,
    pub buffers: u64,
    pub dropped: u64,
}

/// Detector and smoother driven together, one call per buffer
#[derive(Debug)]
pub struct MeterState {
    detector: PeakLevelDetector,
    smoother: LevelSmoother,
    last_level: f32,
    buffers: u64,
    dropped: u64,
}

impl MeterState {
    pub fn new(detector: PeakLevelDetector, history: usize) -> Self {
        Self {
            detector,
            smoother: LevelSmoother::new(history),
            last_level: 0.0,
            buffers: 0,
            dropped: 0,
        }
    }

    /// Detect the buffer's peak, feed it to the smoother and raise the
    /// running maximum. A malformed buffer is counted and left out.
    pub fn process(&mut self, buffer: &[u8]) -> Result<MeterSnapshot, PcmError> {
        let level = match self.detector.detect(buffer) {
            Ok(level) => level,
            Err(err) => {
                self.dropped += 1;
                return Err(err);
            }
        };

        self.smoother.insert(level);
        self.smoother.update_running_maximum();
        self.last_level = level;
        self.buffers += 1;

        tracing::trace!(
            level = level * 100.0,
            mean = self.smoother.scaled_mean(),
            "processed buffer"
        );

        Ok(self.snapshot())
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
        self.last_level = 0.0;
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            level: self.last_level,
            scaled_mean: self.smoother.scaled_mean(),
            running_max: self.smoother.running_maximum(),
            buffers: self.buffers,
            dropped: self.dropped,
        }
    }

    pub fn format(&self) -> &SampleFormat {
        self.detector.format()
    }
}

/// Thread-safe handle shared between the audio callback and the UI
#[derive(Debug, Clone)]
pub struct SharedMeter {
    inner: Arc<Mutex<MeterState>>,
}

impl SharedMeter {
    /// Create a shared meter for `format` with `history` buffers of smoothing
    pub fn new(format: SampleFormat, history: usize) -> Result<Self, PcmError> {
        let detector = PeakLevelDetector::new(format)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(MeterState::new(detector, history))),
        })
    }

    // The state is plain numbers, so a panic elsewhere can't leave it torn.
    fn lock(&self) -> MutexGuard<'_, MeterState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Process one buffer under a single lock acquisition
    pub fn process(&self, buffer: &[u8]) -> Result<MeterSnapshot, PcmError> {
        let result = self.lock().process(buffer);
        if let Err(err) = &result {
            tracing::debug!("dropping buffer: {}", err);
        }
        result
    }

    pub fn reset(&self) {
        self.lock().reset();
        tracing::info!("meter reset");
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.lock().snapshot()
    }

    pub fn format(&self) -> SampleFormat {
        *self.lock().format()
    }

    /// Number of buffers averaged for display
    pub fn history(&self) -> usize {
        self.lock().smoother.capacity()
    }

    /// A fresh meter for a new input format, keeping the history length.
    /// Levels, running maximum and counters start over.
    pub fn reconfigured(&self, format: SampleFormat) -> Result<Self, PcmError> {
        let meter = Self::new(format, self.history())?;
        tracing::info!(?format, "meter reconfigured");
        Ok(meter)
    }
}

/// Internal application state
pub struct AppState {
    pub device_name: String,
    pub meter: MeterSnapshot,
    pub mode: CaptureMode,
    pub suspended: bool,
}

impl AppState {
    /// Create a new application state with default values
    pub fn new(device_name: String, mode: CaptureMode) -> Self {
        Self {
            device_name,
            meter: MeterSnapshot::default(),
            mode,
            suspended: false,
        }
    }

    /// Update state from the shared meter
    pub fn update_from_meter(&mut self, meter: &SharedMeter) {
        self.meter = meter.snapshot();
    }

    /// Point the state at a newly opened device; the new stream starts running
    pub fn switch_device(&mut self, device_name: String) {
        self.device_name = device_name;
        self.meter = MeterSnapshot::default();
        self.suspended = false;
    }

    /// Status line shown under the device name
    pub fn status(&self) -> String {
        let activity = if self.suspended { "Suspended" } else { "Active" };
        format!(
            "{} ({} mode), {} buffers, {} dropped. r: reset  space: stop/start  m: push/pull  d: device  Esc: quit",
            activity, self.mode, self.meter.buffers, self.meter.dropped
        )
    }
}
