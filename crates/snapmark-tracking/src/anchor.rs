//! Freezing tracked objects in place.

use std::collections::BTreeSet;

use log::{debug, info};
use snapmark_core::MarkerId;

use crate::binder::TrackedEntityBinder;
use crate::scene::{ObjectHandle, Scene};

/// Promotes tracked objects into the permanent anchor set.
#[derive(Debug, Default)]
pub struct AnchorController {
    anchored: BTreeSet<ObjectHandle>,
}

impl AnchorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects anchored so far. Membership is permanent.
    pub fn anchored(&self) -> &BTreeSet<ObjectHandle> {
        &self.anchored
    }

    pub fn is_anchored(&self, object: ObjectHandle) -> bool {
        self.anchored.contains(&object)
    }

    /// Anchor whatever the binder last recognized.
    ///
    /// With several markers tracked at once this is the last one processed
    /// in the latest batch that tracked anything. Returns `false` and
    /// changes nothing when no marker is recognized.
    pub fn anchor_currently_recognized<S: Scene + ?Sized>(
        &mut self,
        binder: &mut TrackedEntityBinder,
        scene: &mut S,
    ) -> bool {
        let target = binder.recognized().cloned();
        self.anchor(binder, scene, target.as_ref())
    }

    /// Anchor `target`, typically [`BatchOutcome::recognized`] of the batch
    /// just processed.
    ///
    /// [`BatchOutcome::recognized`]: crate::BatchOutcome::recognized
    pub fn anchor<S: Scene + ?Sized>(
        &mut self,
        binder: &mut TrackedEntityBinder,
        scene: &mut S,
        target: Option<&MarkerId>,
    ) -> bool {
        let Some(marker) = target else {
            debug!("anchor requested with no recognized marker");
            return false;
        };
        let Some(object) = binder.mark_anchored(marker) else {
            debug!("marker '{}' cannot be anchored", marker);
            return false;
        };

        scene.reparent_to_anchor_root(object);
        scene.set_active(object, true);
        self.anchored.insert(object);
        info!("anchored object {:?} of marker '{}'", object, marker);
        true
    }
}
