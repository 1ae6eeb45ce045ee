//! Composite surface management
//!
//! Owns the off-screen surface that merges the background image and the
//! live visual-source pixels into one recordable frame. The surface buffer
//! has exactly one writer (the manager's `paint`) and one reader (the
//! encoder's video track).

use crate::host::VisualSource;
use crate::recorder::types::{QualityProfile, TARGET_FRAME_RATE};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Fill color used when no background image is present (#020617)
pub const FILL_COLOR: Rgba<u8> = Rgba([2, 6, 23, 255]);

/// A track-constraint request was rejected
#[derive(Debug, Clone, Error)]
#[error("video track constraints rejected: {0}")]
pub struct ConstraintError(String);

/// Read-only handle to the composite surface's pixel buffer
///
/// This is the video side of the recordable stream: the encoder samples it
/// at the track's frame rate while the frame copy loop repaints underneath.
#[derive(Clone)]
pub struct SurfaceVideoTrack {
    buffer: Arc<RwLock<Option<RgbaImage>>>,
    frame_rate: u32,
}

impl SurfaceVideoTrack {
    /// Nominal frame rate of the track
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Current surface dimensions, `None` before the surface is sized
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffer.read().as_ref().map(|b| b.dimensions())
    }

    /// Copy out the current composite frame
    pub fn sample(&self) -> Option<RgbaImage> {
        self.buffer.read().clone()
    }

    /// Best-effort request that the track match the given format
    ///
    /// Rejections are reported, not enforced; callers log and continue.
    pub fn apply_constraints(
        &self,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<(), ConstraintError> {
        if frame_rate != self.frame_rate {
            return Err(ConstraintError(format!(
                "requested {frame_rate} fps, track runs at {} fps",
                self.frame_rate
            )));
        }
        match self.dimensions() {
            Some((w, h)) if (w, h) == (width, height) => Ok(()),
            Some((w, h)) => Err(ConstraintError(format!(
                "requested {width}x{height}, surface is {w}x{h}"
            ))),
            None => Err(ConstraintError("surface is not sized".to_string())),
        }
    }
}

/// Off-screen drawing target for one capture session
///
/// Sized from the visual source's native resolution multiplied by the
/// quality scale. The manager is the only writer to the pixel buffer.
pub struct CompositeSurface {
    visual: Arc<dyn VisualSource>,
    buffer: Arc<RwLock<Option<RgbaImage>>>,
    background: Option<RgbaImage>,
    // Cover-fit render of `background` at the current surface size
    background_scaled: Option<RgbaImage>,
}

impl CompositeSurface {
    pub fn new(visual: Arc<dyn VisualSource>) -> Self {
        Self {
            visual,
            buffer: Arc::new(RwLock::new(None)),
            background: None,
            background_scaled: None,
        }
    }

    /// Replace the backdrop with a newly decoded image
    ///
    /// Undecodable bytes clear the background and fall back to the plain
    /// fill, matching how a failed image load behaves in the hosting UI.
    pub fn load_background(&mut self, encoded: Option<&[u8]>) {
        self.background = match encoded {
            Some(bytes) => match image::load_from_memory(bytes) {
                Ok(decoded) => Some(decoded.to_rgba8()),
                Err(err) => {
                    tracing::warn!("background image decode failed: {err}");
                    None
                }
            },
            None => None,
        };
        self.background_scaled = None;
    }

    /// Size (or resize) the surface for the given quality profile
    ///
    /// No-op when dimensions are unchanged. Returns `None` while the visual
    /// source has zero extent; callers treat that as "not ready", not an
    /// error.
    pub fn ensure_surface(&mut self, quality: QualityProfile) -> Option<(u32, u32)> {
        let (width, height) = quality.surface_size(self.visual.dimensions())?;
        let mut guard = self.buffer.write();
        if guard.as_ref().map(|b| b.dimensions()) != Some((width, height)) {
            *guard = Some(RgbaImage::from_pixel(width, height, FILL_COLOR));
            self.background_scaled = None;
            tracing::debug!(width, height, "composite surface sized");
        }
        Some((width, height))
    }

    /// Current surface dimensions, if sized
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffer.read().as_ref().map(|b| b.dimensions())
    }

    /// Paint one composite frame: backdrop first, then the visual source
    /// scaled to fill the surface
    ///
    /// Idempotent between visual-source updates; a no-op until the surface
    /// has been sized.
    pub fn paint(&mut self) {
        let frame = self.visual.current_frame();
        let mut guard = self.buffer.write();
        let Some(buffer) = guard.as_mut() else {
            return;
        };
        let (width, height) = buffer.dimensions();

        if self.background.is_some()
            && self.background_scaled.as_ref().map(|b| b.dimensions()) != Some((width, height))
        {
            self.background_scaled = self
                .background
                .as_ref()
                .map(|img| cover_fit(img, width, height));
        }

        match &self.background_scaled {
            Some(backdrop) => buffer.clone_from(backdrop),
            None => {
                for pixel in buffer.pixels_mut() {
                    *pixel = FILL_COLOR;
                }
            }
        }

        if let Some(frame) = frame {
            if frame.dimensions() == (width, height) {
                imageops::overlay(buffer, &frame, 0, 0);
            } else {
                let scaled = imageops::resize(&frame, width, height, FilterType::Triangle);
                imageops::overlay(buffer, &scaled, 0, 0);
            }
        }
    }

    /// Derive the live video track read by the encoder
    pub fn video_track(&self) -> SurfaceVideoTrack {
        SurfaceVideoTrack {
            buffer: Arc::clone(&self.buffer),
            frame_rate: TARGET_FRAME_RATE,
        }
    }

    /// Drop the pixel buffer and cached backdrop
    ///
    /// Called when the recording subsystem is disabled; `ensure_surface`
    /// re-allocates on the next session.
    pub fn release(&mut self) {
        *self.buffer.write() = None;
        self.background_scaled = None;
    }
}

/// Cover-fit placement of an image inside a target rectangle
///
/// Preserves aspect ratio, fills the whole target, and center-crops the
/// overflowing dimension. Returns `(offset_x, offset_y, render_w, render_h)`
/// where offsets may be negative.
fn cover_fit_rect(image_w: u32, image_h: u32, target_w: u32, target_h: u32) -> (i64, i64, u32, u32) {
    if image_w == 0 || image_h == 0 || target_w == 0 || target_h == 0 {
        return (0, 0, target_w, target_h);
    }

    let image_aspect = f64::from(image_w) / f64::from(image_h);
    let target_aspect = f64::from(target_w) / f64::from(target_h);

    let (render_w, render_h) = if image_aspect > target_aspect {
        (image_aspect * f64::from(target_h), f64::from(target_h))
    } else {
        (f64::from(target_w), f64::from(target_w) / image_aspect)
    };

    let offset_x = ((f64::from(target_w) - render_w) / 2.0).round() as i64;
    let offset_y = ((f64::from(target_h) - render_h) / 2.0).round() as i64;
    (offset_x, offset_y, render_w.round() as u32, render_h.round() as u32)
}

fn cover_fit(image: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let (image_w, image_h) = image.dimensions();
    let (offset_x, offset_y, render_w, render_h) =
        cover_fit_rect(image_w, image_h, target_w, target_h);

    let scaled = if (render_w, render_h) == (image_w, image_h) {
        image.clone()
    } else {
        imageops::resize(image, render_w.max(1), render_h.max(1), FilterType::Triangle)
    };

    let mut out = RgbaImage::from_pixel(target_w, target_h, FILL_COLOR);
    imageops::overlay(&mut out, &scaled, offset_x, offset_y);
    out
}
