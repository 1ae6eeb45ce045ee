//! Recorder state and configuration types
//!
//! Defines the capture lifecycle state machine's data model: clip ranges,
//! quality profiles, playback snapshots, and the finished clip artifact.

use crate::recorder::artifact::DownloadUrl;
use crate::utils::error::ErrorDetail;
use crate::utils::time::clamp_range;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Frame rate requested for the composite video track
pub const TARGET_FRAME_RATE: u32 = 60;

/// Video bitrate at quality scale 1.0, in bits per second
pub const BASELINE_VIDEO_BITRATE: u32 = 8_000_000;

/// Fixed audio bitrate, in bits per second
pub const AUDIO_BITS_PER_SECOND: u32 = 256_000;

/// Default clip length offered before the operator picks an end mark
pub const DEFAULT_CLIP_SECONDS: f64 = 12.0;

/// User-chosen capture window, in seconds of source playback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRange {
    pub start: f64,
    pub end: f64,
}

impl ClipRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Default range for a freshly loaded source
    pub fn default_for(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: clamp_range(DEFAULT_CLIP_SECONDS, 0.0, duration),
        }
    }

    /// Clamp both bounds into `[0, duration]`
    pub fn clamped(&self, duration: f64) -> Self {
        Self {
            start: clamp_range(self.start, 0.0, duration),
            end: clamp_range(self.end, 0.0, duration),
        }
    }

    /// A range is recordable only when `end > start` strictly
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Length of the window in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Scale factor applied to the visual source's native resolution
///
/// Determines both the composite surface size and the target video bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub scale: f64,
}

impl QualityProfile {
    /// Standard quality (native resolution)
    pub const STANDARD: QualityProfile = QualityProfile { scale: 1.0 };

    /// High quality (1.5x resolution)
    pub const HIGH: QualityProfile = QualityProfile { scale: 1.5 };

    /// Ultra quality (2x resolution)
    pub const ULTRA: QualityProfile = QualityProfile { scale: 2.0 };

    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// Scale with non-positive and non-finite values treated as 1.0
    pub fn effective_scale(&self) -> f64 {
        if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }

    /// Composite surface size for a visual source of the given native size
    ///
    /// `None` while the source has zero extent (not yet rendered).
    pub fn surface_size(&self, (width, height): (u32, u32)) -> Option<(u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let scale = self.effective_scale();
        let scaled_w = ((f64::from(width) * scale).round() as u32).max(1);
        let scaled_h = ((f64::from(height) * scale).round() as u32).max(1);
        Some((scaled_w, scaled_h))
    }

    /// Estimated output resolution, for display in the hosting UI
    pub fn output_size(&self, native: (u32, u32)) -> Option<(u32, u32)> {
        self.surface_size(native)
    }

    /// Target video bitrate: baseline scaled by `max(scale, 1)`
    pub fn video_bits_per_second(&self) -> u32 {
        (self.effective_scale().max(1.0) * f64::from(BASELINE_VIDEO_BITRATE)).round() as u32
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::HIGH
    }
}

/// Transport position and play state captured before a session starts
///
/// Restored on every exit path so capture never leaves playback somewhere
/// the operator did not put it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub position: f64,
    pub was_playing: bool,
}

/// Current phase of the capture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderPhase {
    /// No capture in progress
    Idle,
    /// Acquiring surface, tracks, and encoder
    Preparing,
    /// Actively capturing
    Recording,
    /// Waiting for the encoder to flush
    Processing,
    /// A finished clip is available
    Ready,
    /// The last session failed
    Error,
}

impl Default for RecorderPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Full recorder state, phase plus its payload
///
/// A single tagged value rather than separate flags, so an artifact can only
/// exist in `Ready` and an error detail only in `Error`.
#[derive(Debug, Clone)]
pub enum RecorderState {
    Idle,
    Preparing,
    Recording,
    Processing,
    Ready(RecordedClip),
    Error(ErrorDetail),
}

impl RecorderState {
    pub fn phase(&self) -> RecorderPhase {
        match self {
            RecorderState::Idle => RecorderPhase::Idle,
            RecorderState::Preparing => RecorderPhase::Preparing,
            RecorderState::Recording => RecorderPhase::Recording,
            RecorderState::Processing => RecorderPhase::Processing,
            RecorderState::Ready(_) => RecorderPhase::Ready,
            RecorderState::Error(_) => RecorderPhase::Error,
        }
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

/// A completed capture artifact
#[derive(Debug, Clone)]
pub struct RecordedClip {
    /// Encoded container bytes
    pub data: Arc<Vec<u8>>,

    /// Negotiated container/codec MIME type
    pub mime_type: String,

    /// Size of the encoded data in bytes
    pub size_bytes: u64,

    /// Live download reference; revoked when the clip is replaced or reset
    pub download_url: DownloadUrl,

    /// The capture window this clip covers
    pub range: ClipRange,

    /// When the clip finished encoding
    pub created_at: DateTime<Utc>,
}

impl RecordedClip {
    /// Download name in the `clip-<start>-<end>.<ext>` pattern
    pub fn suggested_filename(&self) -> String {
        format!(
            "clip-{}-{}.{}",
            self.range.start.round() as i64,
            self.range.end.round() as i64,
            extension_for(&self.mime_type)
        )
    }

    /// Size in mebibytes, for display
    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Write the encoded bytes to disk
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.data.as_slice())
    }

    /// Serializable summary for the hosting UI
    pub fn metadata(&self) -> ClipMetadata {
        ClipMetadata {
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            download_url: self.download_url.to_string(),
            start_seconds: self.range.start,
            end_seconds: self.range.end,
            created_at: self.created_at,
            suggested_filename: self.suggested_filename(),
        }
    }
}

/// Clip summary exposed to the hosting UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMetadata {
    pub mime_type: String,
    pub size_bytes: u64,
    pub download_url: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub created_at: DateTime<Utc>,
    pub suggested_filename: String,
}

/// File extension for a negotiated MIME type
pub fn extension_for(mime_type: &str) -> &str {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match essence {
        "video/webm" => "webm",
        "video/mp4" => "mp4",
        _ => essence.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("bin"),
    }
}

/// Events broadcast during a capture session
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// The lifecycle moved to a new phase
    PhaseChanged(RecorderPhase),

    /// Transport position observed by the monitor loop, in seconds
    Progress(f64),

    /// Non-fatal degradation (missing audio track, rejected constraints)
    Warning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_range_validity() {
        assert!(ClipRange::new(3.0, 9.0).is_valid());
        assert!(!ClipRange::new(9.0, 9.0).is_valid());
        assert!(!ClipRange::new(9.0, 3.0).is_valid());
    }

    #[test]
    fn test_clip_range_clamped_to_duration() {
        let range = ClipRange::new(-2.0, 500.0).clamped(60.0);
        assert_eq!(range.start, 0.0);
        assert_eq!(range.end, 60.0);
    }

    #[test]
    fn test_clip_range_default_for_short_source() {
        let range = ClipRange::default_for(8.0);
        assert_eq!(range.start, 0.0);
        assert_eq!(range.end, 8.0);

        let range = ClipRange::default_for(300.0);
        assert_eq!(range.end, DEFAULT_CLIP_SECONDS);
    }

    #[test]
    fn test_quality_surface_size_rounds() {
        assert_eq!(QualityProfile::HIGH.surface_size((800, 450)), Some((1200, 675)));
        assert_eq!(QualityProfile::STANDARD.surface_size((800, 450)), Some((800, 450)));
        assert_eq!(QualityProfile::new(1.5).surface_size((0, 450)), None);
    }

    #[test]
    fn test_quality_doubling_scale_doubles_size() {
        let base = QualityProfile::STANDARD.surface_size((640, 360)).unwrap();
        let doubled = QualityProfile::ULTRA.surface_size((640, 360)).unwrap();
        assert_eq!(doubled, (base.0 * 2, base.1 * 2));
    }

    #[test]
    fn test_quality_bitrate_never_below_baseline() {
        assert_eq!(QualityProfile::new(0.5).video_bits_per_second(), BASELINE_VIDEO_BITRATE);
        assert_eq!(QualityProfile::STANDARD.video_bits_per_second(), BASELINE_VIDEO_BITRATE);
        assert_eq!(QualityProfile::ULTRA.video_bits_per_second(), 16_000_000);
    }

    #[test]
    fn test_quality_invalid_scale_falls_back() {
        assert_eq!(QualityProfile::new(0.0).effective_scale(), 1.0);
        assert_eq!(QualityProfile::new(-2.0).effective_scale(), 1.0);
        assert_eq!(QualityProfile::new(f64::NAN).effective_scale(), 1.0);
    }

    #[test]
    fn test_extension_for_mime_types() {
        assert_eq!(extension_for("video/webm;codecs=vp9,opus"), "webm");
        assert_eq!(extension_for("video/webm"), "webm");
        assert_eq!(extension_for("video/mp4"), "mp4");
    }

    #[test]
    fn test_phase_serialization_is_lowercase() {
        let json = serde_json::to_string(&RecorderPhase::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    fn sample_clip(data: Vec<u8>, range: ClipRange) -> RecordedClip {
        let mut store = crate::recorder::artifact::ArtifactStore::new();
        let size_bytes = data.len() as u64;
        let data = Arc::new(data);
        let download_url = store.mint(Arc::clone(&data));
        RecordedClip {
            data,
            mime_type: "video/webm".to_string(),
            size_bytes,
            download_url,
            range,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_clip_suggested_filename_rounds_bounds() {
        let clip = sample_clip(vec![0], ClipRange::new(2.6, 9.4));
        assert_eq!(clip.suggested_filename(), "clip-3-9.webm");
    }

    #[test]
    fn test_clip_size_megabytes() {
        let clip = sample_clip(vec![0; 1024 * 1024], ClipRange::new(0.0, 1.0));
        assert!((clip.size_megabytes() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clip_write_to_disk() -> anyhow::Result<()> {
        let clip = sample_clip(vec![1, 2, 3, 4], ClipRange::new(3.0, 9.0));
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(clip.suggested_filename());
        clip.write_to(&path)?;
        assert_eq!(std::fs::read(&path)?, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_clip_metadata_serializes_camel_case() {
        let clip = sample_clip(vec![7; 16], ClipRange::new(0.0, 4.0));
        let json = serde_json::to_value(clip.metadata()).unwrap();
        assert_eq!(json["mimeType"], "video/webm");
        assert_eq!(json["sizeBytes"], 16);
        assert_eq!(json["suggestedFilename"], "clip-0-4.webm");
        assert!(json["downloadUrl"].as_str().unwrap().starts_with("mem://clip/"));
    }
}
