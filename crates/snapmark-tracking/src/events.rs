use serde::{Deserialize, Serialize};
use snapmark_core::{MarkerId, Pose, TrackingState};

/// One marker as reported by the detection subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub marker: MarkerId,
    pub pose: Pose,
    pub tracking_state: TrackingState,
}

impl DetectedMarker {
    pub fn new(marker: impl Into<MarkerId>, pose: Pose, tracking_state: TrackingState) -> Self {
        Self {
            marker: marker.into(),
            pose,
            tracking_state,
        }
    }

    pub fn tracking(marker: impl Into<MarkerId>, pose: Pose) -> Self {
        Self::new(marker, pose, TrackingState::Tracking)
    }
}

/// Changes reported by one detection cycle.
///
/// Entries are processed added first, then updated, then removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    #[serde(default)]
    pub added: Vec<DetectedMarker>,
    #[serde(default)]
    pub updated: Vec<DetectedMarker>,
    #[serde(default)]
    pub removed: Vec<DetectedMarker>,
}

impl DetectionBatch {
    pub fn added(markers: impl IntoIterator<Item = DetectedMarker>) -> Self {
        Self {
            added: markers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn updated(markers: impl IntoIterator<Item = DetectedMarker>) -> Self {
        Self {
            updated: markers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn removed(markers: impl IntoIterator<Item = DetectedMarker>) -> Self {
        Self {
            removed: markers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}
