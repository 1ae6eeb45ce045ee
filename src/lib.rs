//! vizclip - synchronized audio+video clip capture for live-rendered scenes.
//!
//! Captures a time-bounded clip of a continuously redrawn visual surface,
//! composited over an optional background image, in sync with the audio
//! source driving it. The hosting application supplies its platform pieces
//! (frame clock, audio transport, visual source, encoder) through the
//! [`host`] traits; [`recorder::ClipRecorder`] owns the capture lifecycle
//! and the finished artifact.

pub mod compositor;
pub mod host;
pub mod recorder;
pub mod utils;

pub use compositor::{CompositeSurface, SurfaceVideoTrack};
pub use host::{
    AudioTransport, BackgroundSource, ClipEncoder, EncoderConfig, EncoderCreateError,
    EncoderEvent, EncoderFactory, FrameClock, FrameTicks, IntervalFrameClock, LiveAudioTrack,
    MediaTracks, PlaybackRefused, VisualSource,
};
pub use recorder::{
    ClipRange, ClipRecorder, DownloadUrl, QualityProfile, RecordedClip, RecorderEvent,
    RecorderHandles, RecorderPhase, RecorderState,
};
pub use utils::error::{ErrorDetail, RecorderError, RecorderResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for hosts that have no subscriber of their own
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vizclip=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
