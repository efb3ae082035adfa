//! Keeping virtual objects attached to tracked markers.
//!
//! The detection subsystem reports, once per detection cycle, which markers
//! were added, updated or removed. [`TrackedEntityBinder`] turns those
//! batches into scene operations:
//! - the first sighting of a marker spawns one object from a round-robin
//!   [`TemplateSet`],
//! - while a marker is fully tracked its object copies the marker pose
//!   exactly and stays visible,
//! - otherwise the object is hidden but kept for re-detection.
//!
//! [`AnchorController`] freezes an object in place; anchored objects are
//! never touched by synchronization again.

mod anchor;
mod binder;
mod events;
mod scene;
mod sync;
mod templates;

pub use anchor::AnchorController;
pub use binder::{BatchOutcome, TrackedBinding, TrackedEntityBinder, TrackingError};
pub use events::{DetectedMarker, DetectionBatch};
pub use scene::{ObjectHandle, Parent, Scene, SceneGraph, SceneObject};
pub use sync::{synchronize, SyncEffect};
pub use templates::{select_template, TemplateSet};
