//! Marker-to-object bindings driven by detection batches.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};
use snapmark_core::{MarkerId, Pose, TrackingState};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::events::{DetectedMarker, DetectionBatch};
use crate::scene::{ObjectHandle, Scene};
use crate::sync::{synchronize, SyncEffect};
use crate::templates::TemplateSet;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// An updated/removed entry names a marker that was never added.
    #[error("detection references unknown marker '{marker}' (no prior added event)")]
    UnknownBinding { marker: MarkerId },
}

/// Association of one marker with its virtual object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedBinding {
    pub object: ObjectHandle,
    pub tracking_state: TrackingState,
    pub anchored: bool,
}

/// What one [`TrackedEntityBinder::apply_batch`] call changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    /// Objects spawned for first-time markers, in processing order.
    pub spawned: Vec<(MarkerId, ObjectHandle)>,
    /// Markers whose object now follows a fresh pose.
    pub tracked: Vec<MarkerId>,
    /// Markers whose object was hidden.
    pub deactivated: Vec<MarkerId>,
    /// The last marker in this batch that was tracked and not anchored.
    ///
    /// This is the anchor candidate for the same logical step.
    pub recognized: Option<MarkerId>,
}

/// Owns all bindings for a session.
///
/// At most one binding, and thus one spawned object, exists per marker for
/// the lifetime of the binder.
#[derive(Debug)]
pub struct TrackedEntityBinder {
    templates: TemplateSet,
    bindings: HashMap<MarkerId, TrackedBinding>,
    spawn_counter: u64,
    recognized: Option<MarkerId>,
}

impl TrackedEntityBinder {
    pub fn new(templates: TemplateSet) -> Self {
        Self {
            templates,
            bindings: HashMap::new(),
            spawn_counter: 0,
            recognized: None,
        }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn binding(&self, marker: &MarkerId) -> Option<&TrackedBinding> {
        self.bindings.get(marker)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&MarkerId, &TrackedBinding)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of objects spawned so far.
    pub fn spawn_count(&self) -> u64 {
        self.spawn_counter
    }

    /// Most recently tracked marker across all batches.
    ///
    /// Cleared once that marker stops tracking or is anchored.
    pub fn recognized(&self) -> Option<&MarkerId> {
        self.recognized.as_ref()
    }

    /// Process one detection cycle.
    ///
    /// The batch is checked first: if an updated or removed entry refers to
    /// a marker that is neither bound nor added earlier in the same batch,
    /// nothing is applied and [`TrackingError::UnknownBinding`] is returned.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, scene, batch),
            fields(
                added = batch.added.len(),
                updated = batch.updated.len(),
                removed = batch.removed.len()
            )
        )
    )]
    pub fn apply_batch<S: Scene + ?Sized>(
        &mut self,
        scene: &mut S,
        batch: &DetectionBatch,
    ) -> Result<BatchOutcome, TrackingError> {
        self.check_batch(batch)?;

        let mut outcome = BatchOutcome::default();
        for detection in &batch.added {
            if !self.bindings.contains_key(&detection.marker) {
                let object = self.spawn(scene, detection);
                outcome.spawned.push((detection.marker.clone(), object));
            }
            self.apply(scene, detection, detection.tracking_state, &mut outcome);
        }
        for detection in &batch.updated {
            self.apply(scene, detection, detection.tracking_state, &mut outcome);
        }
        for detection in &batch.removed {
            self.apply(scene, detection, TrackingState::None, &mut outcome);
        }

        if let Some(marker) = &outcome.recognized {
            self.recognized = Some(marker.clone());
        }
        Ok(outcome)
    }

    fn check_batch(&self, batch: &DetectionBatch) -> Result<(), TrackingError> {
        let added: HashSet<&MarkerId> = batch.added.iter().map(|d| &d.marker).collect();
        batch
            .updated
            .iter()
            .chain(&batch.removed)
            .find(|d| !self.bindings.contains_key(&d.marker) && !added.contains(&d.marker))
            .map_or(Ok(()), |d| {
                Err(TrackingError::UnknownBinding {
                    marker: d.marker.clone(),
                })
            })
    }

    fn spawn<S: Scene + ?Sized>(
        &mut self,
        scene: &mut S,
        detection: &DetectedMarker,
    ) -> ObjectHandle {
        let template = self.templates.pick(self.spawn_counter);
        let spawn_pose = Pose::new(detection.pose.position, UnitQuaternion::identity());
        let object = scene.spawn(template, &spawn_pose);
        info!(
            "spawned '{}' (#{}) for marker '{}'",
            template, self.spawn_counter, detection.marker
        );
        self.spawn_counter += 1;
        self.bindings.insert(
            detection.marker.clone(),
            TrackedBinding {
                object,
                tracking_state: TrackingState::None,
                anchored: false,
            },
        );
        object
    }

    fn apply<S: Scene + ?Sized>(
        &mut self,
        scene: &mut S,
        detection: &DetectedMarker,
        state: TrackingState,
        outcome: &mut BatchOutcome,
    ) {
        let Some(binding) = self.bindings.get_mut(&detection.marker) else {
            return;
        };
        match synchronize(binding, scene, detection, state) {
            SyncEffect::Tracked => {
                outcome.tracked.push(detection.marker.clone());
                outcome.recognized = Some(detection.marker.clone());
            }
            SyncEffect::Deactivated => {
                // A lost marker can no longer be anchored.
                if outcome.recognized.as_ref() == Some(&detection.marker) {
                    outcome.recognized = None;
                }
                if self.recognized.as_ref() == Some(&detection.marker) {
                    self.recognized = None;
                }
                outcome.deactivated.push(detection.marker.clone());
            }
            SyncEffect::Frozen => debug!("'{}' is anchored, skipping", detection.marker),
        }
    }

    /// Mark `marker` anchored. Returns its object, or `None` when the marker
    /// is unknown or already anchored. Clears the recognized slot if it
    /// pointed at `marker`.
    pub(crate) fn mark_anchored(&mut self, marker: &MarkerId) -> Option<ObjectHandle> {
        let binding = self.bindings.get_mut(marker)?;
        if binding.anchored {
            return None;
        }
        binding.anchored = true;
        if self.recognized.as_ref() == Some(marker) {
            self.recognized = None;
        }
        Some(binding.object)
    }
}
