//! Marker libraries and the asynchronous registration protocol.
//!
//! A photo becomes a marker in three steps:
//! - its pixels are reduced to a grayscale [`GrayscaleBuffer`],
//! - a [`MarkerDescriptor`](snapmark_core::MarkerDescriptor) with physical
//!   size is built,
//! - both are handed to a background insertion task against a mutable
//!   [`MarkerLibrary`].
//!
//! The buffer is owned by exactly one party at a time and released exactly
//! once, after the insertion finished. [`BufferLedger`] makes that
//! observable.

mod buffer;
mod library;
mod registrar;
mod runtime_library;

pub use buffer::{BufferLedger, GrayscaleBuffer};
pub use library::{FixedMarkerLibrary, MarkerLibrary, MutableMarkerLibrary, ValidationError};
pub use registrar::{MarkerRegistrar, RegistrationError, RegistrationHandle, RegistrationStatus};
pub use runtime_library::{LibraryEntry, RuntimeLibraryParams, RuntimeMarkerLibrary};
