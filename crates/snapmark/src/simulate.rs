//! Scripted headless sessions.
//!
//! A [`Scenario`] plays the part of the user and the detection subsystem:
//! it takes photos, reports detections that refer to earlier photos by
//! index, and presses the anchor trigger. [`run_scenario`] drives a
//! [`Coordinator`] over a [`SceneGraph`] and summarizes the outcome as a
//! serializable [`SimulationReport`].

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use snapmark_core::{build_descriptor, ImageId, MarkerId, PhysicalSize, Pose, TrackingState};
use snapmark_tracking::{BatchOutcome, DetectedMarker, DetectionBatch, Parent, SceneGraph};
use tokio::sync::{broadcast, watch};

use crate::capture::{CaptureSurface, PhotoCaptured, StillFrameSurface};
use crate::coordinator::{Coordinator, CoordinatorError, TakePhotoOutcome};
use crate::session::SessionState;
use crate::{CancelToken, ConfigError, SnapmarkConfig};

#[derive(thiserror::Error, Debug)]
pub enum SimulateError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("step {step} refers to photo #{photo}, but only {taken} photos were taken")]
    UnknownPhoto {
        step: usize,
        photo: usize,
        taken: usize,
    },
}

/// Synthetic checkerboard frame used when no image is supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub cell: u32,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            cell: 8,
        }
    }
}

impl FrameSpec {
    pub fn surface(&self) -> StillFrameSurface {
        StillFrameSurface::checkerboard(self.width, self.height, self.cell)
    }
}

/// One detected marker in a scripted batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedDetection {
    /// Index of the photo, in capture order.
    pub photo: usize,
    pub position: [f32; 3],
    #[serde(default = "default_state")]
    pub state: TrackingState,
}

fn default_state() -> TrackingState {
    TrackingState::Tracking
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    TakePhoto,
    Detect {
        #[serde(default)]
        added: Vec<ScriptedDetection>,
        #[serde(default)]
        updated: Vec<ScriptedDetection>,
        #[serde(default)]
        removed: Vec<ScriptedDetection>,
    },
    /// Anchor the marker recognized by the preceding detection step.
    Anchor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub frame: FrameSpec,
    pub steps: Vec<ScriptStep>,
}

impl Default for Scenario {
    /// Photograph once, see the marker, lose it, then press anchor.
    fn default() -> Self {
        let seen = ScriptedDetection {
            photo: 0,
            position: [1.0, 0.0, 2.0],
            state: TrackingState::Tracking,
        };
        let lost = ScriptedDetection {
            state: TrackingState::None,
            ..seen.clone()
        };
        Self {
            frame: FrameSpec::default(),
            steps: vec![
                ScriptStep::TakePhoto,
                ScriptStep::Detect {
                    added: vec![seen],
                    updated: Vec::new(),
                    removed: Vec::new(),
                },
                ScriptStep::Detect {
                    added: Vec::new(),
                    updated: Vec::new(),
                    removed: vec![lost],
                },
                ScriptStep::Anchor,
            ],
        }
    }
}

impl Scenario {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PhotoReport {
    pub image: ImageId,
    pub width_px: u32,
    pub height_px: u32,
    /// Physical size submitted with the marker, when it could be computed.
    pub physical_size: Option<PhysicalSize>,
    pub status: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct LedgerReport {
    pub allocated: usize,
    pub released: usize,
    pub outstanding: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct BindingReport {
    pub marker: MarkerId,
    pub template: String,
    pub pose: Pose,
    pub active: bool,
    pub anchored: bool,
    pub tracking_state: TrackingState,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnchorReport {
    pub step: usize,
    pub marker: Option<MarkerId>,
    pub anchored: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub photos: Vec<PhotoReport>,
    pub ignored_triggers: usize,
    pub ledger: LedgerReport,
    pub bindings: Vec<BindingReport>,
    pub anchors: Vec<AnchorReport>,
    pub rejected_batches: Vec<String>,
}

impl SimulationReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Play `scenario` against a fresh coordinator built from `config`.
pub async fn run_scenario<C: CaptureSurface + ?Sized>(
    config: &SnapmarkConfig,
    scenario: &Scenario,
    surface: &C,
) -> Result<SimulationReport, SimulateError> {
    config.validate()?;
    let mut coordinator = Coordinator::new(config, config.build_library(), SceneGraph::new());
    let mut photos_rx = coordinator.subscribe_photos();
    let cancel = CancelToken::new();

    let (session_tx, mut session_rx) = watch::channel(SessionState::SessionInitializing);
    session_tx.send_replace(SessionState::SessionTracking);
    coordinator.start(&mut session_rx, &cancel).await?;

    let mut taken: Vec<ImageId> = Vec::new();
    let mut photos = Vec::new();
    let mut ignored_triggers = 0;
    let mut anchors = Vec::new();
    let mut rejected_batches = Vec::new();
    let mut last_outcome: Option<BatchOutcome> = None;

    for (step, action) in scenario.steps.iter().enumerate() {
        match action {
            ScriptStep::TakePhoto => match coordinator.take_photo(surface, &cancel).await? {
                TakePhotoOutcome::Registered { image, status } => {
                    let (width_px, height_px) = captured_size(&mut photos_rx, image);
                    let physical_size = build_descriptor(
                        width_px,
                        height_px,
                        config.physical_width_meters,
                        MarkerId::from(image),
                    )
                    .ok()
                    .map(|d| d.size);
                    taken.push(image);
                    photos.push(PhotoReport {
                        image,
                        width_px,
                        height_px,
                        physical_size,
                        status: status.to_string(),
                    });
                }
                TakePhotoOutcome::Ignored => ignored_triggers += 1,
            },
            ScriptStep::Detect {
                added,
                updated,
                removed,
            } => {
                let mut batch = DetectionBatch {
                    added: resolve(step, added, &taken)?,
                    updated: resolve(step, updated, &taken)?,
                    removed: resolve(step, removed, &taken)?,
                };
                limit_tracked(&mut batch, coordinator.max_tracked_images());
                match coordinator.handle_detection(&batch) {
                    Ok(outcome) => last_outcome = Some(outcome),
                    Err(err) => {
                        warn!("step {}: {}", step, err);
                        rejected_batches.push(err.to_string());
                        last_outcome = None;
                    }
                }
            }
            ScriptStep::Anchor => {
                let outcome = last_outcome.take().unwrap_or_default();
                let anchored = coordinator.anchor_recognized(&outcome);
                anchors.push(AnchorReport {
                    step,
                    marker: outcome.recognized,
                    anchored,
                });
            }
        }
    }

    let ledger = coordinator.registrar().ledger();
    let report = SimulationReport {
        photos,
        ignored_triggers,
        ledger: LedgerReport {
            allocated: ledger.allocated(),
            released: ledger.released(),
            outstanding: ledger.outstanding(),
        },
        bindings: binding_reports(&coordinator),
        anchors,
        rejected_batches,
    };
    info!(
        "simulation finished: {} photos, {} bindings",
        report.photos.len(),
        report.bindings.len()
    );
    Ok(report)
}

fn captured_size(rx: &mut broadcast::Receiver<PhotoCaptured>, image: ImageId) -> (u32, u32) {
    while let Ok(photo) = rx.try_recv() {
        if photo.id == image {
            return (photo.image.size.width, photo.image.size.height);
        }
    }
    (0, 0)
}

fn resolve(
    step: usize,
    entries: &[ScriptedDetection],
    taken: &[ImageId],
) -> Result<Vec<DetectedMarker>, SimulateError> {
    entries
        .iter()
        .map(|entry| {
            let image = taken
                .get(entry.photo)
                .copied()
                .ok_or(SimulateError::UnknownPhoto {
                    step,
                    photo: entry.photo,
                    taken: taken.len(),
                })?;
            let [x, y, z] = entry.position;
            Ok(DetectedMarker::new(
                image,
                Pose::from_position(x, y, z),
                entry.state,
            ))
        })
        .collect()
}

/// The detection subsystem follows at most `max` markers at full quality;
/// any further tracked entries in a batch are reported as limited.
fn limit_tracked(batch: &mut DetectionBatch, max: usize) {
    let mut tracked = 0;
    for entry in batch.added.iter_mut().chain(batch.updated.iter_mut()) {
        if entry.tracking_state.is_tracking() {
            tracked += 1;
            if tracked > max {
                warn!("marker '{}' exceeds the tracked-image limit", entry.marker);
                entry.tracking_state = TrackingState::Limited;
            }
        }
    }
}

fn binding_reports(coordinator: &Coordinator<SceneGraph>) -> Vec<BindingReport> {
    let mut reports: Vec<BindingReport> = coordinator
        .binder()
        .bindings()
        .filter_map(|(marker, binding)| {
            let object = coordinator.scene().object(binding.object)?;
            Some(BindingReport {
                marker: marker.clone(),
                template: object.template.clone(),
                pose: object.pose,
                active: object.active,
                anchored: binding.anchored && object.parent == Parent::AnchorRoot,
                tracking_state: binding.tracking_state,
            })
        })
        .collect();
    reports.sort_by(|a, b| a.marker.as_str().cmp(b.marker.as_str()));
    reports
}

/// Run the built-in scenario on its synthetic frame.
pub async fn run_default(config: &SnapmarkConfig) -> Result<SimulationReport, SimulateError> {
    let scenario = Scenario::default();
    run_scenario(config, &scenario, &scenario.frame.surface()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_scenario_registers_and_hides_the_object() {
        let report = run_default(&SnapmarkConfig::default()).await.unwrap();

        assert_eq!(report.photos.len(), 1);
        assert_eq!(report.photos[0].status, "added");
        assert_eq!(report.ledger.allocated, 1);
        assert_eq!(report.ledger.outstanding, 0);
        assert_eq!(report.bindings.len(), 1);
        assert!(!report.bindings[0].active);
        assert_eq!(report.bindings[0].tracking_state, TrackingState::None);
        assert_eq!(report.anchors.len(), 1);
        assert!(!report.anchors[0].anchored);
    }

    #[tokio::test]
    async fn detection_of_missing_photo_is_an_error() {
        let scenario = Scenario {
            frame: FrameSpec::default(),
            steps: vec![ScriptStep::Detect {
                added: vec![ScriptedDetection {
                    photo: 2,
                    position: [0.0, 0.0, 0.0],
                    state: TrackingState::Tracking,
                }],
                updated: Vec::new(),
                removed: Vec::new(),
            }],
        };
        let err = run_scenario(&SnapmarkConfig::default(), &scenario, &scenario.frame.surface())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulateError::UnknownPhoto { step: 0, photo: 2, taken: 0 }
        ));
    }

    #[test]
    fn extra_tracked_entries_become_limited() {
        let pose = Pose::identity();
        let mut batch = DetectionBatch::added(
            ["a", "b", "c"]
                .into_iter()
                .map(|m| DetectedMarker::tracking(m, pose)),
        );
        limit_tracked(&mut batch, 2);
        let states: Vec<_> = batch.added.iter().map(|d| d.tracking_state).collect();
        assert_eq!(
            states,
            vec![
                TrackingState::Tracking,
                TrackingState::Tracking,
                TrackingState::Limited
            ]
        );
    }

    #[test]
    fn scenario_parses_tagged_steps() {
        let json = r#"{
            "steps": [
                {"action": "take_photo"},
                {"action": "detect", "added": [{"photo": 0, "position": [1, 0, 2]}]},
                {"action": "anchor"}
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.frame, FrameSpec::default());
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(
            &scenario.steps[1],
            ScriptStep::Detect { added, .. } if added[0].state == TrackingState::Tracking
        ));
    }
}
