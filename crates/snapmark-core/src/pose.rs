use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Rigid world pose of a tracked marker or a virtual object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Pose {
    pub fn new(position: Point3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with identity rotation.
    pub fn from_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn identity() -> Self {
        Self::from_position(0.0, 0.0, 0.0)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tracking confidence reported by the detection subsystem for one marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Not tracked at all.
    #[default]
    None,
    /// Tracked with reduced confidence, pose may be stale.
    Limited,
    /// Fully tracked; the reported pose is current.
    Tracking,
}

impl TrackingState {
    /// Only full tracking drives pose synchronization.
    #[inline]
    pub fn is_tracking(self) -> bool {
        matches!(self, TrackingState::Tracking)
    }
}
