//! Application constants and configuration values

/// Audio capture constants
pub mod audio {
    /// Sample rate requested when the device supports it
    pub const PREFERRED_SAMPLE_RATE: u32 = 8000;
    /// Mono capture is preferred; the meter takes the peak across channels anyway
    pub const PREFERRED_CHANNELS: u16 = 1;
    /// Buffer size for audio streams
    pub const BUFFER_SIZE: cpal::BufferSize = cpal::BufferSize::Default;
    /// Largest chunk processed at once in pull mode
    pub const CHUNK_BYTES: usize = 4096;
    /// Capacity of the byte ring between the audio thread and the UI in pull mode
    pub const PULL_RING_BYTES: usize = 64 * 1024;
}

/// UI display constants
pub mod ui {
    /// UI update interval in milliseconds
    pub const UPDATE_INTERVAL_MS: u64 = 10;
    /// Bar width calculation accounts for borders
    pub const BAR_BORDER_WIDTH: usize = 2;
}

/// Smoothing constants
pub mod smoothing {
    /// Number of recent buffer levels averaged for display
    pub const DEFAULT_HISTORY: usize = 20;
    /// Upper bound accepted from the command line
    pub const MAX_HISTORY: usize = 10_000;
}

/// Logging constants
pub mod logging {
    /// Environment variable holding the tracing filter directive
    pub const FILTER_ENV: &str = "LEVELMETER_LOG";
    /// Filter used when the variable is unset
    pub const DEFAULT_FILTER: &str = "info";
}
