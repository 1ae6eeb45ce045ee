//! Test doubles for the host collaborators
//!
//! Deterministic stand-ins used across the crate's test suites: a manually
//! ticked frame clock, a scriptable audio transport, a solid-color visual
//! source, and an encoder factory that records what it was asked to build.

use crate::compositor::SurfaceVideoTrack;
use crate::host::encoder::{
    ClipEncoder, EncoderConfig, EncoderCreateError, EncoderEvent, EncoderFactory, MediaTracks,
};
use crate::host::{
    AudioTransport, BackgroundSource, FrameClock, FrameTicks, LiveAudioTrack, PlaybackRefused,
    VisualSource,
};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc};

/// Let spawned capture loops observe everything queued so far
///
/// The tests run on tokio's current-thread runtime, so a handful of yields
/// drains every ready task deterministically.
pub(crate) async fn drive() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Frame clock advanced explicitly by the test
pub(crate) struct ManualFrameClock {
    sender: broadcast::Sender<()>,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emit one display-frame tick
    pub fn tick(&self) {
        let _ = self.sender.send(());
    }
}

impl FrameClock for ManualFrameClock {
    fn subscribe(&self) -> FrameTicks {
        FrameTicks::new(self.sender.subscribe())
    }
}

/// Scriptable audio transport
pub(crate) struct FakeTransport {
    position: Mutex<f64>,
    duration: f64,
    playing: AtomicBool,
    provide_audio_track: bool,
    block_play: bool,
}

impl FakeTransport {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            position: Mutex::new(0.0),
            duration,
            playing: AtomicBool::new(false),
            provide_audio_track: true,
            block_play: false,
        }
    }

    /// No live audio track, as when the platform withholds the stream
    pub fn without_audio_track(mut self) -> Self {
        self.provide_audio_track = false;
        self
    }

    /// Refuse `play()`, as under autoplay restrictions
    pub fn blocking_playback(mut self) -> Self {
        self.block_play = true;
        self
    }

    pub fn set_position(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    /// Advance playback time, as the platform would while playing
    pub fn advance(&self, seconds: f64) {
        if self.playing.load(Ordering::SeqCst) {
            *self.position.lock() += seconds;
        }
    }

    pub fn force_playing(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioTransport for FakeTransport {
    fn position(&self) -> f64 {
        *self.position.lock()
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn play(&self) -> Result<(), PlaybackRefused> {
        if self.block_play {
            return Err(PlaybackRefused("Browser blocked playback.".to_string()));
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    async fn seek(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    fn audio_track(&self) -> Option<LiveAudioTrack> {
        self.provide_audio_track.then(|| LiveAudioTrack {
            id: "fake-audio".to_string(),
            sample_rate: 48_000,
        })
    }
}

/// Solid-color visual source that counts the frames it serves
pub(crate) struct FakeVisualSource {
    dimensions: Mutex<(u32, u32)>,
    fill: Mutex<Rgba<u8>>,
    serve_frames: AtomicBool,
    frames_served: AtomicUsize,
}

impl FakeVisualSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dimensions: Mutex::new((width, height)),
            fill: Mutex::new(Rgba([255, 255, 255, 255])),
            serve_frames: AtomicBool::new(true),
            frames_served: AtomicUsize::new(0),
        }
    }

    pub fn set_dimensions(&self, width: u32, height: u32) {
        *self.dimensions.lock() = (width, height);
    }

    pub fn set_fill(&self, fill: Rgba<u8>) {
        *self.fill.lock() = fill;
    }

    /// Report dimensions but serve no frame, as before the first render
    pub fn clear_frame(&self) {
        self.serve_frames.store(false, Ordering::SeqCst);
    }

    /// How many frames paint loops have pulled
    pub fn frames_served(&self) -> usize {
        self.frames_served.load(Ordering::SeqCst)
    }
}

impl VisualSource for FakeVisualSource {
    fn dimensions(&self) -> (u32, u32) {
        *self.dimensions.lock()
    }

    fn current_frame(&self) -> Option<RgbaImage> {
        if !self.serve_frames.load(Ordering::SeqCst) {
            return None;
        }
        let (width, height) = *self.dimensions.lock();
        if width == 0 || height == 0 {
            return None;
        }
        self.frames_served.fetch_add(1, Ordering::SeqCst);
        Some(RgbaImage::from_pixel(width, height, *self.fill.lock()))
    }
}

/// Background provider returning fixed encoded bytes
pub(crate) struct FakeBackground {
    bytes: Option<Vec<u8>>,
}

impl FakeBackground {
    pub fn none() -> Self {
        Self { bytes: None }
    }
}

impl BackgroundSource for FakeBackground {
    fn background(&self) -> Option<Vec<u8>> {
        self.bytes.clone()
    }
}

struct CreateRecord {
    config: EncoderConfig,
    video: SurfaceVideoTrack,
    sender: mpsc::UnboundedSender<EncoderEvent>,
}

/// Encoder factory that records construction requests
///
/// Created encoders emit one data chunk (a WebM EBML header stub) followed
/// by `Stopped` when asked to stop. `inject_error` simulates a mid-capture
/// encoder failure on the most recently created encoder.
pub(crate) struct FakeEncoderFactory {
    supported: Vec<String>,
    fail_message: Option<String>,
    last: Mutex<Option<CreateRecord>>,
}

impl FakeEncoderFactory {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|s| s.to_string()).collect(),
            fail_message: None,
            last: Mutex::new(None),
        }
    }

    /// Claim support but reject every construction attempt
    pub fn failing(message: &str) -> Self {
        Self {
            supported: Vec::new(),
            fail_message: Some(message.to_string()),
            last: Mutex::new(None),
        }
    }

    pub fn created_any(&self) -> bool {
        self.last.lock().is_some()
    }

    pub fn last_config(&self) -> Option<EncoderConfig> {
        self.last.lock().as_ref().map(|record| record.config.clone())
    }

    pub fn last_video_track(&self) -> Option<SurfaceVideoTrack> {
        self.last.lock().as_ref().map(|record| record.video.clone())
    }

    /// Make the live encoder report a runtime failure
    pub fn inject_error(&self, message: &str) {
        if let Some(record) = self.last.lock().as_ref() {
            let _ = record
                .sender
                .send(EncoderEvent::Error(message.to_string()));
        }
    }
}

impl EncoderFactory for FakeEncoderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        if self.fail_message.is_some() {
            return true;
        }
        self.supported.iter().any(|supported| supported == mime_type)
    }

    fn create(
        &self,
        tracks: MediaTracks,
        config: EncoderConfig,
    ) -> Result<(Box<dyn ClipEncoder>, mpsc::UnboundedReceiver<EncoderEvent>), EncoderCreateError>
    {
        if let Some(message) = &self.fail_message {
            return Err(EncoderCreateError(message.clone()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        *self.last.lock() = Some(CreateRecord {
            config,
            video: tracks.video.clone(),
            sender: sender.clone(),
        });
        Ok((
            Box::new(FakeEncoder {
                sender,
                stopped: false,
            }),
            receiver,
        ))
    }
}

// First bytes of any WebM container (EBML header magic)
const WEBM_STUB: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

struct FakeEncoder {
    sender: mpsc::UnboundedSender<EncoderEvent>,
    stopped: bool,
}

impl ClipEncoder for FakeEncoder {
    fn start(&mut self) {}

    fn request_stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = self.sender.send(EncoderEvent::Data(WEBM_STUB.to_vec()));
        let _ = self.sender.send(EncoderEvent::Stopped);
    }
}
