//! Capture coordinator
//!
//! The single source of truth for the capture lifecycle. Validates start
//! requests, acquires the surface, tracks, and encoder, aligns the audio
//! transport with the clip's start mark, drives the per-frame loops, and
//! owns the finished artifact. Every exit path (completion, cancellation,
//! or failure) releases the loops and tracks and restores the transport to
//! its pre-capture state.

use crate::compositor::CompositeSurface;
use crate::host::{
    AudioTransport, BackgroundSource, EncoderEvent, EncoderFactory, FrameClock, VisualSource,
};
use crate::recorder::artifact::{ArtifactStore, DownloadUrl};
use crate::recorder::session::CaptureSession;
use crate::recorder::sync::{FrameCopyLoop, MonitorLoop};
use crate::recorder::types::{
    ClipRange, PlaybackSnapshot, QualityProfile, RecordedClip, RecorderEvent, RecorderPhase,
    RecorderState,
};
use crate::utils::error::{ErrorDetail, RecorderError, RecorderResult};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Collaborator handles the recorder is constructed over
pub struct RecorderHandles {
    pub transport: Arc<dyn AudioTransport>,
    pub visual: Arc<dyn VisualSource>,
    pub background: Arc<dyn BackgroundSource>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub clock: Arc<dyn FrameClock>,
}

/// Resources owned for the duration of one capture session
struct ActiveSession {
    capture: CaptureSession,
    frame_loop: FrameCopyLoop,
    monitor: MonitorLoop,
    snapshot: PlaybackSnapshot,
    range: ClipRange,
    finalizing: bool,
}

/// Clip recorder state machine
///
/// Cheap to clone into UI callbacks; all clones share one lifecycle.
#[derive(Clone)]
pub struct ClipRecorder {
    inner: Arc<RecorderInner>,
}

struct RecorderInner {
    state: RwLock<RecorderState>,
    enabled: AtomicBool,
    surface: Arc<Mutex<CompositeSurface>>,
    session: Mutex<Option<ActiveSession>>,
    artifacts: Mutex<ArtifactStore>,
    event_tx: broadcast::Sender<RecorderEvent>,
    transport: Arc<dyn AudioTransport>,
    background: Arc<dyn BackgroundSource>,
    encoders: Arc<dyn EncoderFactory>,
    clock: Arc<dyn FrameClock>,
}

impl ClipRecorder {
    pub fn new(handles: RecorderHandles) -> Self {
        // Large enough that a full session's per-tick progress events do not
        // evict the phase transitions for a lagging subscriber.
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RecorderInner {
                state: RwLock::new(RecorderState::Idle),
                enabled: AtomicBool::new(false),
                surface: Arc::new(Mutex::new(CompositeSurface::new(handles.visual))),
                session: Mutex::new(None),
                artifacts: Mutex::new(ArtifactStore::new()),
                event_tx,
                transport: handles.transport,
                background: handles.background,
                encoders: handles.encoders,
                clock: handles.clock,
            }),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> RecorderPhase {
        self.inner.state.read().phase()
    }

    /// The finished clip, while in the `ready` phase
    pub fn clip(&self) -> Option<RecordedClip> {
        match &*self.inner.state.read() {
            RecorderState::Ready(clip) => Some(clip.clone()),
            _ => None,
        }
    }

    /// The last session's error, while in the `error` phase
    pub fn last_error(&self) -> Option<ErrorDetail> {
        match &*self.inner.state.read() {
            RecorderState::Error(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Resolve a download reference to the clip bytes it points at
    pub fn resolve_download(&self, url: &DownloadUrl) -> Option<Arc<Vec<u8>>> {
        self.inner.artifacts.lock().resolve(url)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the recording subsystem
    ///
    /// Disabling tears everything down: the active session is cancelled,
    /// the download reference is revoked, and the surface is released.
    pub async fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.inner.cancel_session().await;
            self.inner.artifacts.lock().revoke_current();
            self.inner.surface.lock().release();
            self.inner.set_state(RecorderState::Idle);
            tracing::info!("recorder disabled");
        }
    }

    /// Start a capture session over the given range
    ///
    /// Validation failures leave the phase at `idle` and are only surfaced
    /// through the returned error; setup failures transition to `error`.
    pub async fn start(&self, range: ClipRange, quality: QualityProfile) -> RecorderResult<()> {
        let inner = &self.inner;

        // Validation: nothing is acquired until all of this passes.
        if !inner.enabled.load(Ordering::SeqCst) {
            return Err(RecorderError::Disabled);
        }
        let duration = inner.transport.duration();
        if !(duration > 0.0) {
            return Err(RecorderError::AudioNotReady);
        }
        if inner.session.lock().is_some() {
            return Err(RecorderError::SessionActive);
        }
        match inner.state.read().phase() {
            RecorderPhase::Idle | RecorderPhase::Ready | RecorderPhase::Error => {}
            _ => return Err(RecorderError::SessionActive),
        }
        let range = range.clamped(duration);
        if !range.is_valid() {
            return Err(RecorderError::InvalidRange(format!(
                "end time {} must be greater than start time {}",
                range.end, range.start
            )));
        }

        // A new session replaces any previous artifact outright.
        inner.artifacts.lock().revoke_current();
        inner.set_state(RecorderState::Preparing);

        let background = inner.background.background();
        {
            let mut surface = inner.surface.lock();
            surface.load_background(background.as_deref());
            if surface.ensure_surface(quality).is_none() {
                return Err(inner.fail_setup(RecorderError::SurfaceNotReady));
            }
        }

        let video = inner.surface.lock().video_track();
        let mut capture = match CaptureSession::begin(
            video,
            inner.transport.as_ref(),
            inner.encoders.as_ref(),
            quality,
        ) {
            Ok(capture) => capture,
            Err(err) => return Err(inner.fail_setup(err)),
        };
        for warning in capture.take_warnings() {
            let _ = inner.event_tx.send(RecorderEvent::Warning(warning));
        }

        let snapshot = PlaybackSnapshot {
            position: inner.transport.position(),
            was_playing: inner.transport.is_playing(),
        };

        // Align the transport on the start mark; the await resolves once
        // the seek has settled, so no stale mid-seek frame gets captured.
        inner.transport.pause();
        inner.transport.seek(range.start).await;

        // Pre-roll frame: the encoder's first sample must not be blank.
        inner.surface.lock().paint();

        let mut frame_loop = FrameCopyLoop::start(inner.clock.as_ref(), Arc::clone(&inner.surface));
        capture.start_encoder();

        if let Err(refused) = inner.transport.play().await {
            frame_loop.stop();
            capture.end();
            inner.transport.pause();
            inner.restore_playback(snapshot).await;
            return Err(inner.fail_setup(RecorderError::PlaybackBlocked(refused.to_string())));
        }

        let (end_tx, end_rx) = mpsc::channel(1);
        let monitor = MonitorLoop::start(
            inner.clock.as_ref(),
            Arc::clone(&inner.transport),
            range.end,
            inner.event_tx.clone(),
            end_tx,
        );

        let events = capture.take_events();
        *inner.session.lock() = Some(ActiveSession {
            capture,
            frame_loop,
            monitor,
            snapshot,
            range,
            finalizing: false,
        });
        inner.set_state(RecorderState::Recording);
        tracing::info!(
            start = range.start,
            end = range.end,
            scale = quality.effective_scale(),
            "recording started"
        );

        if let Some(events) = events {
            spawn_session_driver(Arc::clone(inner), events, end_rx);
        }
        Ok(())
    }

    /// Stop the session early, as if the end mark had been reached
    pub async fn stop(&self) {
        self.inner.finalize().await;
    }

    /// Abandon the session without producing a clip
    ///
    /// Idempotent; a no-op outside an active session.
    pub async fn cancel(&self) {
        self.inner.cancel_session().await;
    }

    /// Return from `ready` or `error` to `idle`, revoking the artifact
    pub fn reset(&self) {
        let resettable = matches!(
            self.inner.state.read().phase(),
            RecorderPhase::Ready | RecorderPhase::Error
        );
        if resettable {
            self.inner.artifacts.lock().revoke_current();
            self.inner.set_state(RecorderState::Idle);
        }
    }

    /// The hosting UI navigated to a different visual scene
    ///
    /// Mid-session this forces a cancellation: the surface would otherwise
    /// keep sampling a scene the operator no longer sees.
    pub async fn visual_source_changed(&self) {
        if self.inner.session.lock().is_some() {
            tracing::warn!("visual scene changed mid-recording; cancelling session");
            let _ = self.inner.event_tx.send(RecorderEvent::Warning(
                "Recording cancelled: the visual scene changed.".to_string(),
            ));
        }
        self.inner.cancel_session().await;
    }
}

impl RecorderInner {
    fn set_state(&self, next: RecorderState) {
        let phase = next.phase();
        let changed = {
            let mut guard = self.state.write();
            let previous = guard.phase();
            *guard = next;
            previous != phase
        };
        if changed {
            tracing::debug!(?phase, "recorder phase changed");
            let _ = self.event_tx.send(RecorderEvent::PhaseChanged(phase));
        }
    }

    /// Record a setup failure and hand the error back for the caller
    fn fail_setup(&self, err: RecorderError) -> RecorderError {
        tracing::warn!("capture setup failed: {err}");
        self.set_state(RecorderState::Error(ErrorDetail::from(&err)));
        err
    }

    /// End-mark handling: stop monitoring, park the transport, ask the
    /// encoder to flush, and put playback back where the operator had it
    async fn finalize(&self) {
        let snapshot = {
            let mut guard = self.session.lock();
            let Some(session) = guard.as_mut() else {
                return;
            };
            if session.finalizing {
                return;
            }
            session.finalizing = true;
            // Both producer loops stop before the encoder is asked to; the
            // encoder's own flush still runs asynchronously after this.
            session.monitor.stop();
            session.frame_loop.stop();
            self.transport.pause();
            session.capture.end();
            session.snapshot
        };
        self.set_state(RecorderState::Processing);
        self.restore_playback(snapshot).await;
    }

    /// Encoder flushed: assemble the artifact and enter `ready`
    fn complete(&self, chunks: Vec<Vec<u8>>) {
        let Some(mut session) = self.session.lock().take() else {
            // Session was cancelled; discard whatever the encoder flushed.
            return;
        };
        session.frame_loop.stop();
        session.monitor.stop();

        let data: Vec<u8> = chunks.concat();
        let size_bytes = data.len() as u64;
        let data = Arc::new(data);
        let download_url = self.artifacts.lock().mint(Arc::clone(&data));
        let clip = RecordedClip {
            data,
            mime_type: session.capture.mime_type().to_string(),
            size_bytes,
            download_url,
            range: session.range,
            created_at: Utc::now(),
        };
        tracing::info!(
            size_bytes,
            mime_type = %clip.mime_type,
            duration = clip.range.duration(),
            "clip ready"
        );
        self.set_state(RecorderState::Ready(clip));
    }

    /// Encoder reported a mid-capture failure
    async fn fail_runtime(&self, message: String) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        session.frame_loop.stop();
        session.monitor.stop();
        self.transport.pause();
        let err = RecorderError::Runtime(message);
        tracing::warn!("{err}");
        self.set_state(RecorderState::Error(ErrorDetail::from(&err)));
        self.restore_playback(session.snapshot).await;
    }

    async fn cancel_session(&self) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        session.monitor.stop();
        session.frame_loop.stop();
        session.capture.end();
        self.transport.pause();
        self.set_state(RecorderState::Idle);
        self.restore_playback(session.snapshot).await;
        tracing::info!("recording cancelled");
    }

    /// Put the transport back where it was before the session
    ///
    /// Failures are swallowed: restoration must never block artifact
    /// delivery.
    async fn restore_playback(&self, snapshot: PlaybackSnapshot) {
        self.transport.seek(snapshot.position).await;
        if snapshot.was_playing {
            if let Err(refused) = self.transport.play().await {
                tracing::debug!("playback restore suppressed: {refused}");
            }
        }
    }
}

/// Drains encoder events and the monitor's end-mark signal for one session
fn spawn_session_driver(
    inner: Arc<RecorderInner>,
    mut encoder_events: mpsc::UnboundedReceiver<EncoderEvent>,
    mut end_reached: mpsc::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        loop {
            tokio::select! {
                Some(()) = end_reached.recv() => {
                    inner.finalize().await;
                }
                event = encoder_events.recv() => match event {
                    Some(EncoderEvent::Data(data)) => {
                        if !data.is_empty() {
                            chunks.push(data);
                        }
                    }
                    Some(EncoderEvent::Stopped) => {
                        inner.complete(std::mem::take(&mut chunks));
                        break;
                    }
                    Some(EncoderEvent::Error(message)) => {
                        inner.fail_runtime(message).await;
                        break;
                    }
                    None => break,
                },
            }
        }
    });
}
