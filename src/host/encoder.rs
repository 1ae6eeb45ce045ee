//! Media encoder abstraction
//!
//! The platform encoder is modeled as a factory plus a control handle with a
//! typed event stream. Data-available, stop, and error callbacks all arrive
//! as [`EncoderEvent`]s on an mpsc channel, so the state machine consumes
//! them as messages instead of nested callback registration.

use crate::compositor::SurfaceVideoTrack;
use crate::host::LiveAudioTrack;
use thiserror::Error;
use tokio::sync::mpsc;

/// Encoder construction failed (unsupported configuration on this host)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EncoderCreateError(pub String);

/// Encoder configuration negotiated by the capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Container/codec MIME type, e.g. `video/webm;codecs=vp9,opus`
    pub mime_type: String,

    /// Target video bitrate in bits per second
    pub video_bits_per_second: u32,

    /// Target audio bitrate in bits per second
    pub audio_bits_per_second: u32,
}

/// The recordable stream handed to the encoder
///
/// Exactly one video track (sampled from the composite surface) and at most
/// one audio track. A missing audio track produces silent video.
pub struct MediaTracks {
    pub video: SurfaceVideoTrack,
    pub audio: Option<LiveAudioTrack>,
}

/// Events emitted by a running encoder
#[derive(Debug, Clone)]
pub enum EncoderEvent {
    /// A chunk of encoded output is available
    Data(Vec<u8>),

    /// The encoder has stopped and flushed all pending chunks
    Stopped,

    /// The encoder failed mid-capture
    Error(String),
}

/// Control handle for one encoder instance
pub trait ClipEncoder: Send {
    /// Begin sampling the attached tracks
    fn start(&mut self);

    /// Ask the encoder to stop and flush
    ///
    /// Safe to call from any state, including repeatedly; a stopped encoder
    /// treats this as a no-op. Completion is reported through
    /// [`EncoderEvent::Stopped`], never assumed by the caller.
    fn request_stop(&mut self);
}

/// Constructor for platform encoders
pub trait EncoderFactory: Send + Sync {
    /// Whether the host can encode the given MIME type
    ///
    /// Hosts that cannot enumerate support should return `false` for
    /// everything; the session then falls back to the generic container.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Construct an encoder bound to the given tracks
    ///
    /// Returns the control handle and the event stream the state machine
    /// will drain.
    fn create(
        &self,
        tracks: MediaTracks,
        config: EncoderConfig,
    ) -> Result<(Box<dyn ClipEncoder>, mpsc::UnboundedReceiver<EncoderEvent>), EncoderCreateError>;
}
