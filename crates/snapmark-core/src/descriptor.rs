//! Physical marker description derived from a photo.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MarkerId;

/// Real-world size of a printed marker, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSize {
    pub width: f32,
    pub height: f32,
}

/// Everything the marker library needs to know about a new marker besides
/// its pixels.
///
/// `guid` and `texture_guid` are reserved for library-assigned identity and
/// are always left unset here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDescriptor {
    pub id: MarkerId,
    pub size: PhysicalSize,
    #[serde(default)]
    pub guid: Option<Uuid>,
    #[serde(default)]
    pub texture_guid: Option<Uuid>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DescriptorError {
    #[error("invalid marker dimensions (width={width}, height={height})")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("physical width must be finite and > 0 (got {0})")]
    InvalidPhysicalWidth(f32),
}

/// Build a descriptor whose physical height keeps the pixel aspect ratio:
/// `height = physical_width * pixel_height / pixel_width`.
pub fn build_descriptor(
    pixel_width: u32,
    pixel_height: u32,
    physical_width: f32,
    id: MarkerId,
) -> Result<MarkerDescriptor, DescriptorError> {
    if pixel_width == 0 {
        return Err(DescriptorError::InvalidDimensions {
            width: pixel_width,
            height: pixel_height,
        });
    }
    if !physical_width.is_finite() || physical_width <= 0.0 {
        return Err(DescriptorError::InvalidPhysicalWidth(physical_width));
    }

    let aspect = pixel_height as f32 / pixel_width as f32;
    Ok(MarkerDescriptor {
        id,
        size: PhysicalSize {
            width: physical_width,
            height: physical_width * aspect,
        },
        guid: None,
        texture_guid: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keeps_aspect_ratio() {
        let d = build_descriptor(64, 48, 0.1, MarkerId::new("a")).unwrap();
        assert_eq!(d.size.width, 0.1);
        assert_relative_eq!(d.size.height, 0.075, epsilon = 1e-6);
        assert_eq!(d.id.as_str(), "a");
    }

    #[test]
    fn portrait_image_is_taller_than_wide() {
        let d = build_descriptor(1080, 1920, 0.2, MarkerId::new("p")).unwrap();
        assert_relative_eq!(d.size.height, 0.2 * 1920.0 / 1080.0, epsilon = 1e-6);
    }

    #[test]
    fn various_dimensions_follow_formula() {
        for &(w, h, p) in &[(1u32, 1u32, 1.0f32), (3, 7, 0.05), (640, 480, 0.25), (17, 1, 2.0)] {
            let d = build_descriptor(w, h, p, MarkerId::new("x")).unwrap();
            assert_eq!(d.size.width, p);
            assert_relative_eq!(d.size.height, p * h as f32 / w as f32, max_relative = 1e-6);
        }
    }

    #[test]
    fn identity_fields_stay_unset() {
        let d = build_descriptor(10, 10, 0.1, MarkerId::new("g")).unwrap();
        assert!(d.guid.is_none());
        assert!(d.texture_guid.is_none());
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = build_descriptor(0, 10, 0.1, MarkerId::new("z")).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::InvalidDimensions {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn non_positive_physical_width_is_rejected() {
        assert!(matches!(
            build_descriptor(10, 10, 0.0, MarkerId::new("z")),
            Err(DescriptorError::InvalidPhysicalWidth(_))
        ));
        assert!(matches!(
            build_descriptor(10, 10, f32::NAN, MarkerId::new("z")),
            Err(DescriptorError::InvalidPhysicalWidth(_))
        ));
    }
}
