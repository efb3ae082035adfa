//! Core types for the snapmark workspace.
//!
//! This crate holds the data model shared by the registration and tracking
//! crates: captured images and their grayscale conversion, marker
//! descriptors with physical size, identifiers, and poses. It does *not*
//! know about marker libraries, scenes or async runtimes.

mod descriptor;
mod ids;
mod image;
mod logger;
mod pose;

pub use descriptor::{build_descriptor, DescriptorError, MarkerDescriptor, PhysicalSize};
pub use ids::{ImageId, MarkerId};
pub use image::{to_grayscale, CapturedImage, ConvertError, GrayImage, PixelFormat, PixelSize};
pub use pose::{Pose, TrackingState};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
