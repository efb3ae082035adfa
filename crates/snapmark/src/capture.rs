//! Capture surface, trigger gate and photo notifications.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use snapmark_core::{CapturedImage, ImageId, PixelFormat, PixelSize};

/// Errors surfaced by a capture.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Render target or readback buffer could not be allocated.
    #[error("out of resources while capturing: {what}")]
    ResourceExhausted { what: String },
    #[error("capture cancelled")]
    Cancelled,
}

/// Raw full-frame readback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub size: PixelSize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Where photos come from.
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Wait for the current frame to finish rendering and read it back
    /// without UI overlays.
    async fn capture(&self) -> Result<RawFrame, CaptureError>;
}

/// Surface that always returns the same frame.
#[derive(Clone, Debug)]
pub struct StillFrameSurface {
    frame: RawFrame,
}

impl StillFrameSurface {
    pub fn new(frame: RawFrame) -> Self {
        Self { frame }
    }

    /// RGB checkerboard with `cell`-pixel squares.
    pub fn checkerboard(width: u32, height: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if ((x / cell) + (y / cell)) % 2 == 0 { 230 } else { 20 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Self::new(RawFrame {
            size: PixelSize::new(width, height),
            format: PixelFormat::Rgb24,
            data,
        })
    }

    /// Decode an image file into an RGB frame.
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        Self::new(RawFrame {
            size: PixelSize::new(rgb.width(), rgb.height()),
            format: PixelFormat::Rgb24,
            data: rgb.into_raw(),
        })
    }

    pub fn frame(&self) -> &RawFrame {
        &self.frame
    }
}

#[async_trait]
impl CaptureSurface for StillFrameSurface {
    async fn capture(&self) -> Result<RawFrame, CaptureError> {
        tokio::task::yield_now().await;
        Ok(self.frame.clone())
    }
}

/// Emitted after each capture with an independent copy of the photo, for
/// display collaborators.
#[derive(Clone, Debug)]
pub struct PhotoCaptured {
    pub id: ImageId,
    pub image: Arc<CapturedImage>,
}

const GATE_DISABLED: u8 = 0;
const GATE_ENABLED: u8 = 1;
const GATE_BUSY: u8 = 2;

/// The "take photo" trigger.
///
/// Disabled until [`enable`](Self::enable) is called, and busy while a
/// [`CapturePermit`] is alive. Only one permit exists at a time.
#[derive(Debug)]
pub struct CaptureGate {
    state: Arc<AtomicU8>,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(GATE_DISABLED)),
        }
    }

    pub fn enable(&self) {
        let _ = self.state.compare_exchange(
            GATE_DISABLED,
            GATE_ENABLED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Whether a trigger would currently be accepted.
    pub fn is_interactable(&self) -> bool {
        self.state.load(Ordering::SeqCst) == GATE_ENABLED
    }

    /// Take the trigger. Returns `None` when disabled or busy.
    pub fn try_acquire(&self) -> Option<CapturePermit> {
        self.state
            .compare_exchange(GATE_ENABLED, GATE_BUSY, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CapturePermit {
                state: Arc::clone(&self.state),
            })
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for a whole capture + registration round trip; re-enables the
/// trigger when dropped.
#[derive(Debug)]
pub struct CapturePermit {
    state: Arc<AtomicU8>,
}

impl Drop for CapturePermit {
    fn drop(&mut self) {
        self.state.store(GATE_ENABLED, Ordering::SeqCst);
    }
}
