//! Asynchronous marker registration.

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use snapmark_core::{
    build_descriptor, to_grayscale, CapturedImage, ConvertError, DescriptorError, MarkerId,
    PixelFormat,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::buffer::{BufferLedger, GrayscaleBuffer};
use crate::library::{MarkerLibrary, ValidationError};

/// Errors that prevent a registration from being submitted or observed.
#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("registration must be submitted from within a tokio runtime")]
    NoRuntime,
    #[error("insertion task for marker '{marker}' did not complete: {reason}")]
    TaskAborted { marker: MarkerId, reason: String },
}

/// Final outcome of a registration.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistrationStatus {
    /// The library accepted the marker.
    Added,
    /// The library rejected the marker during insertion.
    ValidationFailed(ValidationError),
    /// The library does not accept markers at runtime; nothing was scheduled.
    Unsupported,
}

impl RegistrationStatus {
    /// `true` when an insertion task was scheduled, whatever its result.
    pub fn was_submitted(&self) -> bool {
        !matches!(self, RegistrationStatus::Unsupported)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::Added => f.write_str("added"),
            RegistrationStatus::ValidationFailed(err) => write!(f, "validation failed: {err}"),
            RegistrationStatus::Unsupported => f.write_str("unsupported"),
        }
    }
}

enum HandleState {
    Resolved(RegistrationStatus),
    Pending(JoinHandle<RegistrationStatus>),
}

/// Resolves once the insertion task and its buffer release have completed.
pub struct RegistrationHandle {
    marker: MarkerId,
    state: HandleState,
}

impl RegistrationHandle {
    pub fn marker(&self) -> &MarkerId {
        &self.marker
    }

    /// `true` when [`wait`](Self::wait) would not suspend.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Resolved(_) => true,
            HandleState::Pending(task) => task.is_finished(),
        }
    }

    pub async fn wait(self) -> Result<RegistrationStatus, RegistrationError> {
        match self.state {
            HandleState::Resolved(status) => Ok(status),
            HandleState::Pending(task) => task.await.map_err(|err| RegistrationError::TaskAborted {
                marker: self.marker,
                reason: err.to_string(),
            }),
        }
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("marker", &self.marker)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Turns captured photos into library markers.
///
/// Every grayscale buffer the registrar allocates is recorded in its
/// [`BufferLedger`] and released exactly once: immediately on the
/// unsupported path, otherwise by the insertion task after the library call
/// returned.
pub struct MarkerRegistrar {
    library: Arc<dyn MarkerLibrary>,
    ledger: BufferLedger,
}

impl MarkerRegistrar {
    pub fn new(library: Arc<dyn MarkerLibrary>) -> Self {
        Self::with_ledger(library, BufferLedger::new())
    }

    pub fn with_ledger(library: Arc<dyn MarkerLibrary>, ledger: BufferLedger) -> Self {
        Self { library, ledger }
    }

    pub fn library(&self) -> &Arc<dyn MarkerLibrary> {
        &self.library
    }

    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Convert, describe and schedule insertion of `image`.
    ///
    /// Must be called from within a tokio runtime; the insertion runs on the
    /// runtime's blocking pool.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(image = %image.id, width = image.size.width, height = image.size.height)
        )
    )]
    pub fn submit(
        &self,
        image: CapturedImage,
        physical_width: f32,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let marker = MarkerId::from(image.id);
        let gray = to_grayscale(&image)?;
        drop(image);
        let buffer = GrayscaleBuffer::allocate(gray, &self.ledger);
        let size = buffer.size();
        let descriptor = build_descriptor(size.width, size.height, physical_width, marker.clone())?;

        let Some(mutable) = Arc::clone(&self.library).as_mutable() else {
            warn!(
                "library '{}' does not accept runtime markers; dropping '{}'",
                self.library.name(),
                marker
            );
            drop(buffer);
            return Ok(RegistrationHandle {
                marker,
                state: HandleState::Resolved(RegistrationStatus::Unsupported),
            });
        };

        let runtime = Handle::try_current().map_err(|_| RegistrationError::NoRuntime)?;
        info!(
            "scheduling insertion of '{}' ({:.3} x {:.3} m)",
            marker, descriptor.size.width, descriptor.size.height
        );
        let task = runtime.spawn_blocking(move || {
            let outcome = mutable.add_marker(buffer.bytes(), size, PixelFormat::R8, &descriptor);
            drop(buffer);
            match outcome {
                Ok(()) => {
                    info!("marker '{}' added to library", descriptor.id);
                    RegistrationStatus::Added
                }
                Err(err) => {
                    warn!("marker '{}' rejected by library: {}", descriptor.id, err);
                    RegistrationStatus::ValidationFailed(err)
                }
            }
        });

        Ok(RegistrationHandle {
            marker,
            state: HandleState::Pending(task),
        })
    }

    /// [`submit`](Self::submit) and wait for the insertion to finish.
    pub async fn register(
        &self,
        image: CapturedImage,
        physical_width: f32,
    ) -> Result<RegistrationStatus, RegistrationError> {
        self.submit(image, physical_width)?.wait().await
    }
}
