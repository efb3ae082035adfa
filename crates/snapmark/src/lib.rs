//! High-level facade crate for the `snapmark-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates,
//! - JSON configuration ([`SnapmarkConfig`]),
//! - the async [`Coordinator`] that sequences session readiness, photo
//!   capture, marker registration, detection batches and anchoring,
//! - a scripted simulation used by the `snapmark` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use snapmark::{CancelToken, Coordinator, SnapmarkConfig, StillFrameSurface};
//! use snapmark::tracking::SceneGraph;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SnapmarkConfig::default();
//! let coordinator = Coordinator::new(&config, config.build_library(), SceneGraph::new());
//! coordinator.enable_capture();
//!
//! let surface = StillFrameSurface::checkerboard(64, 48, 8);
//! let outcome = coordinator.take_photo(&surface, &CancelToken::new()).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `snapmark::core`: images, identifiers, poses, descriptors, logging.
//! - `snapmark::library`: marker libraries and asynchronous registration.
//! - `snapmark::tracking`: bindings, pose sync, anchoring, scenes.

pub use snapmark_core as core;
pub use snapmark_library as library;
pub use snapmark_tracking as tracking;

mod cancel;
mod capture;
mod config;
mod coordinator;
mod session;
pub mod simulate;

pub use cancel::CancelToken;
pub use capture::{
    CaptureError, CaptureGate, CapturePermit, CaptureSurface, PhotoCaptured, RawFrame,
    StillFrameSurface,
};
pub use config::{ConfigError, LibraryKind, SnapmarkConfig};
pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorEvent, RunSummary, TakePhotoOutcome,
};
pub use session::{wait_until_tracking, SessionError, SessionState};

pub use snapmark_core::{ImageId, MarkerId, Pose, TrackingState};
pub use snapmark_library::RegistrationStatus;
pub use snapmark_tracking::{BatchOutcome, DetectedMarker, DetectionBatch};
