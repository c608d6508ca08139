//! Configuration parsing and validation

use crate::constants::{audio, smoothing};
use crate::error::{AppError, AppResult};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for the levelmeter application
#[derive(Parser)]
#[command(name = "levelmeter")]
#[command(about = "Live microphone level meter")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a live level meter with running average and maximum
    Monitor(MonitorArgs),
    /// Print the level of every processed buffer to stdout
    Print(PrintArgs),
    /// List available audio input devices
    List(ListArgs),
}

/// How captured buffers reach the level detector
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Process each buffer on the audio thread as it arrives
    #[default]
    Push,
    /// Queue raw bytes and process them in chunks from the UI loop
    Pull,
}

impl CaptureMode {
    pub fn toggled(self) -> Self {
        match self {
            CaptureMode::Push => CaptureMode::Pull,
            CaptureMode::Pull => CaptureMode::Push,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Push => write!(f, "push"),
            CaptureMode::Pull => write!(f, "pull"),
        }
    }
}

/// Options shared by every command that opens a capture stream
#[derive(clap::Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    /// Pick the input device from a list before starting
    #[arg(long, conflicts_with = "device")]
    pub select: bool,

    /// Number of recent buffers averaged for the displayed level
    #[arg(long, default_value_t = smoothing::DEFAULT_HISTORY)]
    pub history: usize,

    /// Buffer delivery mode
    #[arg(long, value_enum, default_value_t = CaptureMode::Push)]
    pub mode: CaptureMode,

    /// Largest chunk processed at once in pull mode, in bytes
    #[arg(long, default_value_t = audio::CHUNK_BYTES)]
    pub chunk_bytes: usize,

    /// Sample rate to request when the device supports it
    #[arg(long, default_value_t = audio::PREFERRED_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Write logs to this file (filter with LEVELMETER_LOG)
    #[arg(long)]
    pub log: Option<PathBuf>,
}

#[derive(Parser)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Parser)]
pub struct PrintArgs {
    /// Monitoring duration in seconds (optional, runs until Ctrl+C if not specified)
    #[arg(long)]
    pub seconds: Option<f32>,

    /// Output only the integer values without labels
    #[arg(long)]
    pub quiet: bool,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Parser)]
pub struct ListArgs {}

/// Application configuration derived from command line arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device_name: Option<String>,
    pub select_device: bool,
    pub history: usize,
    pub mode: CaptureMode,
    pub chunk_bytes: usize,
    pub sample_rate: u32,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Create configuration from capture arguments
    pub fn from_capture_args(args: &CaptureArgs) -> AppResult<Self> {
        if args.history == 0 || args.history > smoothing::MAX_HISTORY {
            return Err(AppError::Config(format!(
                "History must be between 1 and {} buffers, got {}",
                smoothing::MAX_HISTORY,
                args.history
            )));
        }

        if args.chunk_bytes < 2 {
            return Err(AppError::Config(format!(
                "Chunk size must be at least 2 bytes, got {}",
                args.chunk_bytes
            )));
        }

        if args.sample_rate == 0 {
            return Err(AppError::Config("Sample rate must be positive".to_string()));
        }

        Ok(Config {
            device_name: args.device.clone(),
            select_device: args.select,
            history: args.history,
            mode: args.mode,
            chunk_bytes: args.chunk_bytes,
            sample_rate: args.sample_rate,
            log_file: args.log.clone(),
        })
    }

    /// Create configuration from monitor arguments
    pub fn from_monitor_args(monitor_args: &MonitorArgs) -> AppResult<Self> {
        Self::from_capture_args(&monitor_args.capture)
    }

    /// Create configuration from print arguments
    ///
    /// Printing always drains buffers from the main loop, so the mode is
    /// forced to pull.
    pub fn from_print_args(print_args: &PrintArgs) -> AppResult<Self> {
        if let Some(seconds) = print_args.seconds {
            parse_seconds(seconds)?;
        }

        let mut config = Self::from_capture_args(&print_args.capture)?;
        config.mode = CaptureMode::Pull;
        Ok(config)
    }
}

/// Convert a `--seconds` value, rejecting anything that isn't a positive,
/// representable duration
pub fn parse_seconds(seconds: f32) -> AppResult<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(AppError::Config(format!(
            "Seconds must be a positive number, got {}",
            seconds
        )));
    }

    Duration::try_from_secs_f32(seconds)
        .map_err(|e| AppError::Config(format!("Seconds out of range ({}): {}", seconds, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        Args::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_monitor_defaults() {
        let Commands::Monitor(monitor_args) = parse(&["levelmeter", "monitor"]) else {
            panic!("expected monitor command");
        };
        let config = Config::from_monitor_args(&monitor_args).unwrap();

        assert_eq!(config.device_name, None);
        assert!(!config.select_device);
        assert_eq!(config.history, 20);
        assert_eq!(config.mode, CaptureMode::Push);
        assert_eq!(config.chunk_bytes, 4096);
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_monitor_options() {
        let Commands::Monitor(monitor_args) = parse(&[
            "levelmeter",
            "monitor",
            "--device",
            "USB Mic",
            "--history",
            "5",
            "--mode",
            "pull",
            "--chunk-bytes",
            "1024",
            "--log",
            "/tmp/levelmeter.log",
        ]) else {
            panic!("expected monitor command");
        };
        let config = Config::from_monitor_args(&monitor_args).unwrap();

        assert_eq!(config.device_name.as_deref(), Some("USB Mic"));
        assert_eq!(config.history, 5);
        assert_eq!(config.mode, CaptureMode::Pull);
        assert_eq!(config.chunk_bytes, 1024);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/levelmeter.log")));
    }

    #[test]
    fn test_device_and_select_conflict() {
        assert!(Args::try_parse_from(["levelmeter", "monitor", "--device", "x", "--select"]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        for args in [
            ["levelmeter", "monitor", "--history", "0"],
            ["levelmeter", "monitor", "--history", "10001"],
            ["levelmeter", "monitor", "--chunk-bytes", "1"],
            ["levelmeter", "monitor", "--sample-rate", "0"],
        ] {
            let Commands::Monitor(monitor_args) = parse(&args) else {
                panic!("expected monitor command");
            };
            assert!(
                matches!(Config::from_monitor_args(&monitor_args), Err(AppError::Config(_))),
                "{:?}",
                args
            );
        }
    }

    #[test]
    fn test_print_forces_pull_mode() {
        let Commands::Print(print_args) =
            parse(&["levelmeter", "print", "--seconds", "2.5", "--quiet", "--mode", "push"])
        else {
            panic!("expected print command");
        };
        let config = Config::from_print_args(&print_args).unwrap();

        assert_eq!(print_args.seconds, Some(2.5));
        assert!(print_args.quiet);
        assert_eq!(config.mode, CaptureMode::Pull);
    }

    #[test]
    fn test_print_rejects_non_positive_seconds() {
        let Commands::Print(print_args) = parse(&["levelmeter", "print", "--seconds", "0"]) else {
            panic!("expected print command");
        };
        assert!(Config::from_print_args(&print_args).is_err());
    }

    #[test]
    fn test_print_rejects_non_finite_seconds() {
        for seconds in ["inf", "NaN", "1e30", "-1"] {
            let arg = format!("--seconds={}", seconds);
            let Commands::Print(print_args) = parse(&["levelmeter", "print", &arg]) else {
                panic!("expected print command");
            };
            assert!(
                matches!(Config::from_print_args(&print_args), Err(AppError::Config(_))),
                "{}",
                seconds
            );
        }
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds(2.5).unwrap(), Duration::from_millis(2500));
        assert!(parse_seconds(f32::INFINITY).is_err());
        assert!(parse_seconds(1e30).is_err());
        assert!(parse_seconds(0.0).is_err());
    }

    #[test]
    fn test_capture_mode_toggles() {
        assert_eq!(CaptureMode::Push.toggled(), CaptureMode::Pull);
        assert_eq!(CaptureMode::Pull.toggled(), CaptureMode::Push);
        assert_eq!(CaptureMode::Pull.to_string(), "pull");
    }
}
