//! Host collaborator abstractions
//!
//! The recorder never talks to the platform directly. Everything it needs
//! from its environment (the per-display-frame clock, the audio transport,
//! the visual scene, the background image, and the media encoder) arrives
//! through the traits in this module, so the capture pipeline can be driven
//! by real platform bindings or by test doubles.

pub mod encoder;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub use encoder::{ClipEncoder, EncoderConfig, EncoderCreateError, EncoderEvent, EncoderFactory, MediaTracks};

/// A subscription to a frame clock's tick stream
///
/// Each successful `next()` corresponds to one display frame. Ticks are
/// buffered per subscriber, so a loop that falls behind still observes that
/// frames elapsed rather than missing its wakeup.
pub struct FrameTicks {
    receiver: broadcast::Receiver<()>,
}

impl FrameTicks {
    pub(crate) fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self { receiver }
    }

    /// Wait for the next frame tick
    ///
    /// Returns `false` once the clock has shut down; loops should exit.
    pub async fn next(&mut self) -> bool {
        match self.receiver.recv().await {
            Ok(()) => true,
            // Falling behind still means frames elapsed
            Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }
}

/// Source of per-display-frame ticks shared by every capture loop
pub trait FrameClock: Send + Sync {
    /// Open a new, independently buffered tick subscription
    fn subscribe(&self) -> FrameTicks;
}

/// Frame clock driven by a wall-clock interval
///
/// Stands in for the host's display refresh callback when no compositor
/// vsync signal is available. Dropping the clock stops the driver task.
pub struct IntervalFrameClock {
    sender: broadcast::Sender<()>,
    driver: tokio::task::JoinHandle<()>,
}

impl IntervalFrameClock {
    /// Start a clock ticking at the given frame rate
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(frames_per_second: u32) -> Self {
        let (sender, _) = broadcast::channel(16);
        let period = Duration::from_secs_f64(1.0 / f64::from(frames_per_second.max(1)));
        let tick_tx = sender.clone();
        let driver = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // No receivers is fine; loops subscribe lazily
                let _ = tick_tx.send(());
            }
        });
        Self { sender, driver }
    }
}

impl FrameClock for IntervalFrameClock {
    fn subscribe(&self) -> FrameTicks {
        FrameTicks::new(self.sender.subscribe())
    }
}

impl Drop for IntervalFrameClock {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// The transport refused to start playback (autoplay restrictions)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PlaybackRefused(pub String);

/// Handle to a continuously updating audio sample stream
///
/// Opaque to the recorder; it is attached to the encoder's input alongside
/// the surface video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAudioTrack {
    /// Track identifier assigned by the audio collaborator
    pub id: String,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Playback transport owned by the audio collaborator
///
/// The recorder only requests transitions; it never assumes exclusive
/// control of the transport beyond a session's lifetime.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Total source duration in seconds; `0.0` while nothing is loaded
    fn duration(&self) -> f64;

    /// Whether the transport is currently playing
    fn is_playing(&self) -> bool;

    /// Start playback
    async fn play(&self) -> Result<(), PlaybackRefused>;

    /// Pause playback
    fn pause(&self);

    /// Seek to a position, resolving once the seek has settled
    async fn seek(&self, seconds: f64);

    /// Live audio track for capture, if the platform exposes one
    fn audio_track(&self) -> Option<LiveAudioTrack>;
}

/// A live-rendered scene with readable pixel dimensions
pub trait VisualSource: Send + Sync {
    /// Native pixel dimensions; `(0, 0)` until the first frame has rendered
    fn dimensions(&self) -> (u32, u32);

    /// The most recently rendered frame, `None` until one exists
    fn current_frame(&self) -> Option<image::RgbaImage>;
}

/// Provider of the optional backdrop image
pub trait BackgroundSource: Send + Sync {
    /// Encoded image bytes (PNG, JPEG, ...), or `None` for the plain fill
    fn background(&self) -> Option<Vec<u8>>;
}
