//! Capture session setup
//!
//! Binds the composite surface's video track and the collaborator's audio
//! track into one recordable stream, negotiates the encoding format, and
//! constructs the encoder. The session exclusively owns the encoder and its
//! tracks until the coordinator tears it down.

use crate::compositor::SurfaceVideoTrack;
use crate::host::{AudioTransport, ClipEncoder, EncoderConfig, EncoderEvent, EncoderFactory, MediaTracks};
use crate::recorder::types::{QualityProfile, AUDIO_BITS_PER_SECOND, TARGET_FRAME_RATE};
use crate::utils::error::{RecorderError, RecorderResult};
use tokio::sync::mpsc;

/// Container/codec preference order, most specific first
pub const MIME_TYPE_PREFERENCES: [&str; 3] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Used when the host cannot enumerate codec support at all
pub const FALLBACK_MIME_TYPE: &str = "video/webm";

/// First supported MIME type from the preference list
pub fn choose_mime_type(factory: &dyn EncoderFactory) -> &'static str {
    for mime_type in MIME_TYPE_PREFERENCES {
        if factory.is_type_supported(mime_type) {
            return mime_type;
        }
    }
    FALLBACK_MIME_TYPE
}

/// One capture session's encoder and stream state
pub struct CaptureSession {
    encoder: Box<dyn ClipEncoder>,
    events: Option<mpsc::UnboundedReceiver<EncoderEvent>>,
    mime_type: String,
    warnings: Vec<String>,
}

impl CaptureSession {
    /// Acquire tracks and construct the encoder
    ///
    /// Fails with [`RecorderError::SurfaceNotReady`] when the video track has
    /// no sized surface behind it, and [`RecorderError::EncoderUnavailable`]
    /// when encoder construction is rejected. A missing audio track and a
    /// rejected constraint request are recorded as warnings, not failures.
    pub fn begin(
        video: SurfaceVideoTrack,
        transport: &dyn AudioTransport,
        factory: &dyn EncoderFactory,
        quality: QualityProfile,
    ) -> RecorderResult<Self> {
        let Some((width, height)) = video.dimensions() else {
            return Err(RecorderError::SurfaceNotReady);
        };

        let mut warnings = Vec::new();

        if let Err(err) = video.apply_constraints(width, height, TARGET_FRAME_RATE) {
            tracing::warn!("{err}");
            warnings.push(err.to_string());
        }

        let audio = transport.audio_track();
        if audio.is_none() {
            let message = "Audio stream unavailable; recording muted video.".to_string();
            tracing::warn!("{message}");
            warnings.push(message);
        }

        let mime_type = choose_mime_type(factory);
        let config = EncoderConfig {
            mime_type: mime_type.to_string(),
            video_bits_per_second: quality.video_bits_per_second(),
            audio_bits_per_second: AUDIO_BITS_PER_SECOND,
        };

        tracing::info!(
            mime_type,
            width,
            height,
            video_bitrate = config.video_bits_per_second,
            has_audio = audio.is_some(),
            "capture session starting"
        );

        let (encoder, events) = factory
            .create(MediaTracks { video, audio }, config)
            .map_err(|err| RecorderError::EncoderUnavailable(err.to_string()))?;

        Ok(Self {
            encoder,
            events: Some(events),
            mime_type: mime_type.to_string(),
            warnings,
        })
    }

    /// Begin encoding
    pub fn start_encoder(&mut self) {
        self.encoder.start();
    }

    /// Ask the encoder to stop and flush
    ///
    /// Callable from any state; a stopped encoder ignores it.
    pub fn end(&mut self) {
        self.encoder.request_stop();
    }

    /// Negotiated MIME type for the session's output
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Take the encoder event stream; `None` once claimed
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<EncoderEvent>> {
        self.events.take()
    }

    /// Drain the non-fatal warnings collected during setup
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}
