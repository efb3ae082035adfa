//! Pose synchronization rule.

use log::debug;
use snapmark_core::TrackingState;

use crate::binder::TrackedBinding;
use crate::events::DetectedMarker;
use crate::scene::Scene;

/// What [`synchronize`] did to a binding's object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEffect {
    /// Object shown and moved to the detected pose.
    Tracked,
    /// Object hidden; pose untouched.
    Deactivated,
    /// Binding is anchored; nothing was written.
    Frozen,
}

/// Apply one detection to a binding.
///
/// Anchored bindings are left alone. Otherwise a fully tracked marker
/// activates the object and copies position and rotation verbatim, and any
/// other state hides it.
pub fn synchronize<S: Scene + ?Sized>(
    binding: &mut TrackedBinding,
    scene: &mut S,
    detection: &DetectedMarker,
    state: TrackingState,
) -> SyncEffect {
    if binding.anchored {
        return SyncEffect::Frozen;
    }

    binding.tracking_state = state;
    if state.is_tracking() {
        scene.set_pose(binding.object, &detection.pose);
        scene.set_active(binding.object, true);
        SyncEffect::Tracked
    } else {
        debug!("tracking lost for '{}'", detection.marker);
        scene.set_active(binding.object, false);
        SyncEffect::Deactivated
    }
}
