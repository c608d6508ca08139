//! Live microphone level meter.
//!
//! [`pcm`] turns raw capture buffers into a peak level and [`smoothing`]
//! averages recent levels for display; the other modules wire those to cpal
//! and a terminal UI.

pub mod app;
pub mod audio;
pub mod config;
pub mod constants;
pub mod error;
pub mod pcm;
pub mod smoothing;
pub mod state;
pub mod telemetry;
pub mod ui;
