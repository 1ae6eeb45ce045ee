//! Clip recording system
//!
//! This module implements the capture pipeline:
//! - CaptureSession binding the surface video track and audio track to an encoder
//! - FrameCopyLoop and MonitorLoop sharing the host frame clock
//! - ClipRecorder, the lifecycle state machine that owns the artifact

pub mod artifact;
pub mod coordinator;
pub mod session;
pub mod sync;
pub mod types;

pub use artifact::{ArtifactStore, DownloadUrl};
pub use coordinator::{ClipRecorder, RecorderHandles};
pub use session::{CaptureSession, FALLBACK_MIME_TYPE, MIME_TYPE_PREFERENCES};
pub use types::{
    ClipMetadata, ClipRange, PlaybackSnapshot, QualityProfile, RecordedClip, RecorderEvent,
    RecorderPhase, RecorderState,
};
