//! Marker library capability model.

use std::collections::BTreeSet;
use std::sync::Arc;

use snapmark_core::{MarkerDescriptor, MarkerId, PixelFormat, PixelSize};

/// Reasons a mutable library refuses a new marker.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ValidationError {
    #[error("marker image is empty")]
    EmptyImage,
    #[error("marker image {width}x{height} is below the minimum side of {min} px")]
    TooSmall { width: u32, height: u32, min: u32 },
    #[error("pixel buffer has {got} bytes, {expected} expected for the given size")]
    SizeMismatch { expected: usize, got: usize },
    #[error("marker pixels must be single-channel, got {0:?}")]
    NotGrayscale(PixelFormat),
    #[error("physical size must be positive (width={width}, height={height})")]
    InvalidPhysicalSize { width: f32, height: f32 },
    #[error("marker '{0}' is already in the library")]
    DuplicateMarker(MarkerId),
    #[error("library is full ({capacity} markers)")]
    LibraryFull { capacity: usize },
}

/// A set of known marker images the detection subsystem matches against.
pub trait MarkerLibrary: Send + Sync {
    /// Human-readable name, for logging.
    fn name(&self) -> &str;

    fn contains(&self, id: &MarkerId) -> bool;

    /// Number of markers currently known.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capability check: returns the library's mutation interface when it
    /// accepts new markers at runtime.
    fn as_mutable(self: Arc<Self>) -> Option<Arc<dyn MutableMarkerLibrary>>;
}

/// A library that accepts new markers while the application runs.
///
/// `add_marker` is called from a background thread and may block while the
/// library validates and indexes the image. The pixel slice is only borrowed
/// for the duration of the call.
pub trait MutableMarkerLibrary: MarkerLibrary {
    fn add_marker(
        &self,
        pixels: &[u8],
        size: PixelSize,
        format: PixelFormat,
        descriptor: &MarkerDescriptor,
    ) -> Result<(), ValidationError>;
}

/// A library fixed at build time.
#[derive(Clone, Debug, Default)]
pub struct FixedMarkerLibrary {
    name: String,
    markers: BTreeSet<MarkerId>,
}

impl FixedMarkerLibrary {
    pub fn new(name: impl Into<String>, markers: impl IntoIterator<Item = MarkerId>) -> Self {
        Self {
            name: name.into(),
            markers: markers.into_iter().collect(),
        }
    }
}

impl MarkerLibrary for FixedMarkerLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn contains(&self, id: &MarkerId) -> bool {
        self.markers.contains(id)
    }

    fn len(&self) -> usize {
        self.markers.len()
    }

    fn as_mutable(self: Arc<Self>) -> Option<Arc<dyn MutableMarkerLibrary>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_library_is_not_mutable() {
        let lib = Arc::new(FixedMarkerLibrary::new(
            "bundled",
            [MarkerId::new("a"), MarkerId::new("b")],
        ));
        assert_eq!(lib.len(), 2);
        assert!(lib.contains(&MarkerId::new("a")));
        assert!(lib.as_mutable().is_none());
    }
}
