//! Custom error types for the application

use crate::pcm::PcmError;
use thiserror::Error;

/// Application-specific error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Audio device related errors
    #[error("Audio device error: {0}")]
    AudioDevice(String),
    /// Audio stream related errors
    #[error("Audio stream error: {0}")]
    AudioStream(String),
    /// Invalid command line configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Sample format could not be used for level detection
    #[error("PCM error: {0}")]
    Pcm(#[from] PcmError),
    /// Interactive prompt failures
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for AppError {
    fn from(err: cpal::DevicesError) -> Self {
        AppError::AudioDevice(format!("Failed to enumerate devices: {}", err))
    }
}

impl From<cpal::DeviceNameError> for AppError {
    fn from(err: cpal::DeviceNameError) -> Self {
        AppError::AudioDevice(format!("Failed to get device name: {}", err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for AppError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        AppError::AudioDevice(format!("Failed to get supported stream configs: {}", err))
    }
}

impl From<cpal::BuildStreamError> for AppError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AppError::AudioStream(format!("Failed to build audio stream: {}", err))
    }
}

impl From<cpal::PlayStreamError> for AppError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AppError::AudioStream(format!("Failed to play audio stream: {}", err))
    }
}

impl From<cpal::PauseStreamError> for AppError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AppError::AudioStream(format!("Failed to pause audio stream: {}", err))
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::Prompt(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_errors_convert() {
        let err: AppError = PcmError::InvalidBufferLength { len: 3, frame_bytes: 2 }.into();
        assert!(matches!(err, AppError::Pcm(_)));
        assert_eq!(
            err.to_string(),
            "PCM error: buffer of 3 bytes is not a whole number of 2-byte frames"
        );
    }

    #[test]
    fn test_config_error_message() {
        let err = AppError::Config("history must be at least 1".to_string());
        assert_eq!(err.to_string(), "Configuration error: history must be at least 1");
    }
}
