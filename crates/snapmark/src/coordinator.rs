//! Sequencing of capture, registration, detection and anchoring.

use std::sync::Arc;

use log::{debug, error, info, warn};
use snapmark_core::{CapturedImage, ImageId, MarkerId};
use snapmark_library::{MarkerLibrary, MarkerRegistrar, RegistrationError, RegistrationStatus};
use snapmark_tracking::{
    AnchorController, BatchOutcome, DetectionBatch, Scene, TrackedEntityBinder, TrackingError,
};
use tokio::sync::{broadcast, mpsc, watch};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::capture::{CaptureError, CaptureGate, CaptureSurface, PhotoCaptured};
use crate::session::{wait_until_tracking, SessionError, SessionState};
use crate::{CancelToken, SnapmarkConfig};

const PHOTO_CHANNEL_CAPACITY: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// Result of a "take photo" trigger.
#[derive(Clone, Debug, PartialEq)]
pub enum TakePhotoOutcome {
    /// The trigger was disabled or a capture was already in flight.
    Ignored,
    Registered {
        image: ImageId,
        status: RegistrationStatus,
    },
}

/// Inbound messages consumed by [`Coordinator::run`].
#[derive(Clone, Debug)]
pub enum CoordinatorEvent {
    /// One detection cycle from the detection subsystem.
    Detection(DetectionBatch),
    /// User pressed "take photo".
    TakePhoto,
    /// User pressed "anchor".
    Anchor,
}

/// What happened during [`Coordinator::run`].
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub photos: Vec<(ImageId, RegistrationStatus)>,
    pub registration_failures: Vec<String>,
    pub ignored_triggers: usize,
    pub batches: usize,
    pub anchored: Vec<MarkerId>,
    /// Anchor triggers that found nothing to anchor.
    pub empty_anchors: usize,
    /// Batches rejected because they referenced unknown markers.
    pub invariant_violations: Vec<TrackingError>,
    pub cancelled: bool,
}

/// Owns the registration and tracking state of one session.
///
/// All methods run on one logical control thread; the only work that
/// leaves it is the marker insertion task.
pub struct Coordinator<S: Scene> {
    physical_width: f32,
    max_tracked_images: usize,
    registrar: MarkerRegistrar,
    binder: TrackedEntityBinder,
    anchors: AnchorController,
    scene: S,
    gate: CaptureGate,
    photos: broadcast::Sender<PhotoCaptured>,
}

impl<S: Scene> Coordinator<S> {
    pub fn new(config: &SnapmarkConfig, library: Arc<dyn MarkerLibrary>, scene: S) -> Self {
        let (photos, _) = broadcast::channel(PHOTO_CHANNEL_CAPACITY);
        Self {
            physical_width: config.physical_width_meters,
            max_tracked_images: config.max_tracked_images,
            registrar: MarkerRegistrar::new(library),
            binder: TrackedEntityBinder::new(config.templates.clone()),
            anchors: AnchorController::new(),
            scene,
            gate: CaptureGate::new(),
            photos,
        }
    }

    pub fn registrar(&self) -> &MarkerRegistrar {
        &self.registrar
    }

    pub fn binder(&self) -> &TrackedEntityBinder {
        &self.binder
    }

    pub fn anchors(&self) -> &AnchorController {
        &self.anchors
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Requested number of simultaneously tracked markers.
    pub fn max_tracked_images(&self) -> usize {
        self.max_tracked_images
    }

    /// Wait for the session to track, then enable the capture trigger.
    pub async fn start(
        &self,
        states: &mut watch::Receiver<SessionState>,
        cancel: &CancelToken,
    ) -> Result<(), CoordinatorError> {
        wait_until_tracking(states, cancel).await?;
        self.enable_capture();
        info!("ready to capture and track markers");
        Ok(())
    }

    /// Enable the "take photo" trigger without waiting for a session.
    pub fn enable_capture(&self) {
        self.gate.enable();
    }

    pub fn is_capture_interactable(&self) -> bool {
        self.gate.is_interactable()
    }

    /// The "anchor" trigger only has an effect while a marker is recognized.
    pub fn is_anchor_interactable(&self) -> bool {
        self.binder.recognized().is_some()
    }

    /// Subscribe to photo-captured notifications.
    pub fn subscribe_photos(&self) -> broadcast::Receiver<PhotoCaptured> {
        self.photos.subscribe()
    }

    /// Capture a photo and register it as a marker.
    ///
    /// The trigger stays disabled until the registration has completed, so at
    /// most one registration from this path is in flight. Cancellation is
    /// honoured while waiting for the frame; once submitted, a registration
    /// always runs to completion.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub async fn take_photo<C: CaptureSurface + ?Sized>(
        &self,
        surface: &C,
        cancel: &CancelToken,
    ) -> Result<TakePhotoOutcome, CoordinatorError> {
        let Some(_permit) = self.gate.try_acquire() else {
            debug!("take photo ignored: trigger not interactable");
            return Ok(TakePhotoOutcome::Ignored);
        };

        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled.into()),
            frame = surface.capture() => frame?,
        };
        let image = CapturedImage::new(frame.size, frame.format, frame.data);
        let id = image.id;
        info!("captured photo {} ({}x{})", id, image.size.width, image.size.height);

        if self.photos.receiver_count() > 0 {
            let _ = self.photos.send(PhotoCaptured {
                id,
                image: Arc::new(image.clone()),
            });
        }

        let status = self.registrar.register(image, self.physical_width).await?;
        Ok(TakePhotoOutcome::Registered { image: id, status })
    }

    /// Apply one detection batch to the bindings.
    pub fn handle_detection(
        &mut self,
        batch: &DetectionBatch,
    ) -> Result<BatchOutcome, TrackingError> {
        self.binder.apply_batch(&mut self.scene, batch)
    }

    /// Anchor the marker the binder recognized most recently.
    pub fn anchor_currently_recognized(&mut self) -> bool {
        self.anchors
            .anchor_currently_recognized(&mut self.binder, &mut self.scene)
    }

    /// Anchor the marker recognized by the batch that produced `outcome`.
    pub fn anchor_recognized(&mut self, outcome: &BatchOutcome) -> bool {
        self.anchor_marker(outcome.recognized.as_ref())
    }

    fn anchor_marker(&mut self, marker: Option<&MarkerId>) -> bool {
        self.anchors
            .anchor(&mut self.binder, &mut self.scene, marker)
    }

    /// Consume inbound events until the queue closes or `cancel` fires.
    ///
    /// An anchor event targets the marker recognized by the most recent
    /// detection batch and consumes it; a second anchor event without a new
    /// batch in between does nothing.
    pub async fn run<C: CaptureSurface + ?Sized>(
        &mut self,
        mut events: mpsc::Receiver<CoordinatorEvent>,
        surface: &C,
        cancel: &CancelToken,
    ) -> Result<RunSummary, CoordinatorError> {
        let mut summary = RunSummary::default();
        let mut candidate: Option<MarkerId> = None;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                CoordinatorEvent::Detection(batch) => match self.handle_detection(&batch) {
                    Ok(outcome) => {
                        summary.batches += 1;
                        candidate = outcome.recognized;
                    }
                    Err(err) => {
                        error!("detection batch rejected: {}", err);
                        summary.invariant_violations.push(err);
                    }
                },
                CoordinatorEvent::TakePhoto => match self.take_photo(surface, cancel).await {
                    Ok(TakePhotoOutcome::Registered { image, status }) => {
                        summary.photos.push((image, status));
                    }
                    Ok(TakePhotoOutcome::Ignored) => summary.ignored_triggers += 1,
                    Err(CoordinatorError::Capture(CaptureError::Cancelled)) => {
                        summary.cancelled = true;
                        break;
                    }
                    Err(CoordinatorError::Registration(err)) => {
                        warn!("registration failed: {}", err);
                        summary.registration_failures.push(err.to_string());
                    }
                    Err(err) => return Err(err),
                },
                CoordinatorEvent::Anchor => {
                    let target = candidate.take();
                    if self.anchor_marker(target.as_ref()) {
                        summary.anchored.extend(target);
                    } else {
                        summary.empty_anchors += 1;
                    }
                }
            }
        }

        Ok(summary)
    }
}
