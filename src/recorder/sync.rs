//! Playback-synchronized capture loops
//!
//! Two cooperative loops share the host frame clock during a session: the
//! frame copy loop repaints the composite surface every display frame, and
//! the monitor loop watches the transport position for the clip's end mark.
//! Both follow the same guarded-task shape: an atomic running flag checked
//! around every tick, stoppable from any thread, idempotently.

use crate::compositor::CompositeSurface;
use crate::host::{AudioTransport, FrameClock};
use crate::recorder::types::RecorderEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Repaints the composite surface once per display frame
///
/// Holds no state beyond its scheduling handle; each session starts a fresh
/// instance.
pub struct FrameCopyLoop {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl FrameCopyLoop {
    /// Start painting on every tick of the given clock
    pub fn start(clock: &dyn FrameClock, surface: Arc<Mutex<CompositeSurface>>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut ticks = clock.subscribe();

        let handle = tokio::spawn(async move {
            while flag.load(Ordering::SeqCst) {
                if !ticks.next().await {
                    break;
                }
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                surface.lock().paint();
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the loop; no paint is scheduled after this returns
    ///
    /// Safe to call multiple times.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for FrameCopyLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watches the transport position until the clip's end mark
///
/// Each tick reads the current position, broadcasts it as progress, and
/// signals the session driver once the end mark is reached.
pub struct MonitorLoop {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MonitorLoop {
    pub fn start(
        clock: &dyn FrameClock,
        transport: Arc<dyn AudioTransport>,
        end_mark: f64,
        events: broadcast::Sender<RecorderEvent>,
        end_reached: mpsc::Sender<()>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut ticks = clock.subscribe();

        let handle = tokio::spawn(async move {
            while flag.load(Ordering::SeqCst) {
                if !ticks.next().await {
                    break;
                }
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                let position = transport.position();
                if position >= end_mark {
                    let _ = end_reached.send(()).await;
                    break;
                }
                let _ = events.send(RecorderEvent::Progress(position));
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the loop; no time check is scheduled after this returns
    ///
    /// Safe to call multiple times.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
