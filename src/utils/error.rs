//! Error types and handling
//!
//! Common error types used across the recorder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recorder-wide error type
///
/// Validation variants are rejected before any resource is acquired and
/// leave the recorder phase untouched; the remaining variants are fatal to
/// the session they occur in.
#[derive(Error, Debug, Clone)]
pub enum RecorderError {
    #[error("recording is disabled")]
    Disabled,

    #[error("no audio source is loaded")]
    AudioNotReady,

    #[error("invalid clip range: {0}")]
    InvalidRange(String),

    #[error("a capture session is already active")]
    SessionActive,

    #[error("the composite surface is not ready")]
    SurfaceNotReady,

    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("{0} Interact with the page and try again.")]
    PlaybackBlocked(String),

    #[error("recording error: {0}")]
    Runtime(String),
}

impl RecorderError {
    /// Whether this error was raised by pre-session validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecorderError::Disabled
                | RecorderError::AudioNotReady
                | RecorderError::InvalidRange(_)
                | RecorderError::SessionActive
        )
    }
}

/// Error detail surfaced to the hosting UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&RecorderError> for ErrorDetail {
    fn from(error: &RecorderError) -> Self {
        let code = match error {
            RecorderError::Disabled => "DISABLED",
            RecorderError::AudioNotReady => "AUDIO_NOT_READY",
            RecorderError::InvalidRange(_) => "INVALID_RANGE",
            RecorderError::SessionActive => "SESSION_ACTIVE",
            RecorderError::SurfaceNotReady => "SURFACE_NOT_READY",
            RecorderError::EncoderUnavailable(_) => "ENCODER_UNAVAILABLE",
            RecorderError::PlaybackBlocked(_) => "PLAYBACK_BLOCKED",
            RecorderError::Runtime(_) => "RECORDING_ERROR",
        };

        ErrorDetail {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
