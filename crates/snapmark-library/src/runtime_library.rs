//! In-memory mutable marker library.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use snapmark_core::{MarkerDescriptor, MarkerId, PixelFormat, PixelSize};

use crate::library::{MarkerLibrary, MutableMarkerLibrary, ValidationError};

/// Validation limits for [`RuntimeMarkerLibrary`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeLibraryParams {
    /// Minimum accepted image side, in pixels.
    pub min_side_px: u32,
    /// Maximum number of markers, `None` for unbounded.
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for RuntimeLibraryParams {
    fn default() -> Self {
        Self {
            min_side_px: 8,
            capacity: None,
        }
    }
}

/// A marker stored in a [`RuntimeMarkerLibrary`].
#[derive(Clone, Debug, PartialEq)]
pub struct LibraryEntry {
    pub descriptor: MarkerDescriptor,
    pub size: PixelSize,
    /// Library-owned copy of the grayscale pixels.
    pub pixels: Vec<u8>,
}

/// Mutable library that validates markers and keeps its own pixel copies.
#[derive(Debug, Default)]
pub struct RuntimeMarkerLibrary {
    name: String,
    params: RuntimeLibraryParams,
    entries: RwLock<BTreeMap<MarkerId, LibraryEntry>>,
}

impl RuntimeMarkerLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_params(name, RuntimeLibraryParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: RuntimeLibraryParams) -> Self {
        Self {
            name: name.into(),
            params,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn params(&self) -> &RuntimeLibraryParams {
        &self.params
    }

    pub fn entry(&self, id: &MarkerId) -> Option<LibraryEntry> {
        self.entries.read().get(id).cloned()
    }

    /// Identifiers of all stored markers, in sorted order.
    pub fn marker_ids(&self) -> Vec<MarkerId> {
        self.entries.read().keys().cloned().collect()
    }

    fn validate(
        &self,
        pixels: &[u8],
        size: PixelSize,
        format: PixelFormat,
        descriptor: &MarkerDescriptor,
    ) -> Result<(), ValidationError> {
        if !format.is_single_channel() {
            return Err(ValidationError::NotGrayscale(format));
        }
        if size.pixel_count() == 0 || pixels.is_empty() {
            return Err(ValidationError::EmptyImage);
        }
        if pixels.len() != size.pixel_count() {
            return Err(ValidationError::SizeMismatch {
                expected: size.pixel_count(),
                got: pixels.len(),
            });
        }
        let min = self.params.min_side_px;
        if size.width < min || size.height < min {
            return Err(ValidationError::TooSmall {
                width: size.width,
                height: size.height,
                min,
            });
        }
        let physical = descriptor.size;
        if !(physical.width.is_finite() && physical.width > 0.0)
            || !(physical.height.is_finite() && physical.height > 0.0)
        {
            return Err(ValidationError::InvalidPhysicalSize {
                width: physical.width,
                height: physical.height,
            });
        }
        Ok(())
    }
}

impl MarkerLibrary for RuntimeMarkerLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn contains(&self, id: &MarkerId) -> bool {
        self.entries.read().contains_key(id)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn as_mutable(self: Arc<Self>) -> Option<Arc<dyn MutableMarkerLibrary>> {
        Some(self)
    }
}

impl MutableMarkerLibrary for RuntimeMarkerLibrary {
    fn add_marker(
        &self,
        pixels: &[u8],
        size: PixelSize,
        format: PixelFormat,
        descriptor: &MarkerDescriptor,
    ) -> Result<(), ValidationError> {
        self.validate(pixels, size, format, descriptor)?;

        let mut entries = self.entries.write();
        if entries.contains_key(&descriptor.id) {
            return Err(ValidationError::DuplicateMarker(descriptor.id.clone()));
        }
        if let Some(capacity) = self.params.capacity {
            if entries.len() >= capacity {
                return Err(ValidationError::LibraryFull { capacity });
            }
        }
        entries.insert(
            descriptor.id.clone(),
            LibraryEntry {
                descriptor: descriptor.clone(),
                size,
                pixels: pixels.to_vec(),
            },
        );
        debug!(
            "library '{}' now holds {} markers",
            self.name,
            entries.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapmark_core::build_descriptor;

    fn descriptor(name: &str, w: u32, h: u32) -> MarkerDescriptor {
        build_descriptor(w, h, 0.1, MarkerId::new(name)).unwrap()
    }

    #[test]
    fn accepts_valid_marker() {
        let lib = RuntimeMarkerLibrary::new("runtime");
        let size = PixelSize::new(16, 8);
        lib.add_marker(&[128; 128], size, PixelFormat::R8, &descriptor("m", 16, 8))
            .unwrap();
        assert!(lib.contains(&MarkerId::new("m")));
        let entry = lib.entry(&MarkerId::new("m")).unwrap();
        assert_eq!(entry.size, size);
        assert_eq!(entry.pixels.len(), 128);
    }

    #[test]
    fn rejects_duplicates() {
        let lib = RuntimeMarkerLibrary::new("runtime");
        let size = PixelSize::new(8, 8);
        let d = descriptor("dup", 8, 8);
        lib.add_marker(&[0; 64], size, PixelFormat::R8, &d).unwrap();
        assert_eq!(
            lib.add_marker(&[0; 64], size, PixelFormat::R8, &d),
            Err(ValidationError::DuplicateMarker(MarkerId::new("dup")))
        );
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn rejects_colour_and_mismatched_buffers() {
        let lib = RuntimeMarkerLibrary::new("runtime");
        let size = PixelSize::new(8, 8);
        let d = descriptor("c", 8, 8);
        assert_eq!(
            lib.add_marker(&[0; 192], size, PixelFormat::Rgb24, &d),
            Err(ValidationError::NotGrayscale(PixelFormat::Rgb24))
        );
        assert_eq!(
            lib.add_marker(&[0; 10], size, PixelFormat::R8, &d),
            Err(ValidationError::SizeMismatch {
                expected: 64,
                got: 10
            })
        );
        assert!(lib.is_empty());
    }

    #[test]
    fn rejects_small_images_and_enforces_capacity() {
        let lib = RuntimeMarkerLibrary::with_params(
            "runtime",
            RuntimeLibraryParams {
                min_side_px: 4,
                capacity: Some(1),
            },
        );
        let small = PixelSize::new(2, 2);
        assert!(matches!(
            lib.add_marker(&[0; 4], small, PixelFormat::R8, &descriptor("s", 2, 2)),
            Err(ValidationError::TooSmall { .. })
        ));
        let ok = PixelSize::new(4, 4);
        lib.add_marker(&[0; 16], ok, PixelFormat::R8, &descriptor("a", 4, 4))
            .unwrap();
        assert_eq!(
            lib.add_marker(&[0; 16], ok, PixelFormat::R8, &descriptor("b", 4, 4)),
            Err(ValidationError::LibraryFull { capacity: 1 })
        );
    }

    #[test]
    fn runtime_library_is_mutable() {
        let lib = Arc::new(RuntimeMarkerLibrary::new("runtime"));
        assert!(lib.as_mutable().is_some());
    }
}
