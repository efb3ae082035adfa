use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use snapmark_core::{
    CapturedImage, MarkerDescriptor, MarkerId, PixelFormat, PixelSize,
};
use snapmark_library::{
    BufferLedger, MarkerLibrary, MarkerRegistrar, MutableMarkerLibrary, RegistrationError,
    RegistrationStatus, RuntimeMarkerLibrary, ValidationError,
};

/// Library that records how many buffers were still alive while it ran.
struct ProbeLibrary {
    ledger: BufferLedger,
    outstanding_during_insert: Mutex<Vec<usize>>,
    delay: Duration,
    fail: bool,
    panic: bool,
    added: AtomicUsize,
}

impl ProbeLibrary {
    fn new(ledger: BufferLedger) -> Self {
        Self {
            ledger,
            outstanding_during_insert: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail: false,
            panic: false,
            added: AtomicUsize::new(0),
        }
    }
}

impl MarkerLibrary for ProbeLibrary {
    fn name(&self) -> &str {
        "probe"
    }

    fn contains(&self, _id: &MarkerId) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    fn as_mutable(self: Arc<Self>) -> Option<Arc<dyn MutableMarkerLibrary>> {
        Some(self)
    }
}

impl MutableMarkerLibrary for ProbeLibrary {
    fn add_marker(
        &self,
        pixels: &[u8],
        size: PixelSize,
        format: PixelFormat,
        _descriptor: &MarkerDescriptor,
    ) -> Result<(), ValidationError> {
        assert_eq!(format, PixelFormat::R8);
        assert_eq!(pixels.len(), size.pixel_count());
        std::thread::sleep(self.delay);
        self.outstanding_during_insert
            .lock()
            .push(self.ledger.outstanding());
        if self.panic {
            panic!("library crashed");
        }
        if self.fail {
            return Err(ValidationError::EmptyImage);
        }
        self.added.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn photo(w: u32, h: u32) -> CapturedImage {
    CapturedImage::new(
        PixelSize::new(w, h),
        PixelFormat::Rgba32,
        vec![200; (w * h * 4) as usize],
    )
}

#[tokio::test]
async fn buffer_outlives_insertion_and_is_released_after() {
    let ledger = BufferLedger::new();
    let mut probe = ProbeLibrary::new(ledger.clone());
    probe.delay = Duration::from_millis(20);
    let probe = Arc::new(probe);
    let registrar = MarkerRegistrar::with_ledger(probe.clone(), ledger.clone());

    let handle = registrar.submit(photo(32, 24), 0.1).unwrap();
    let status = handle.wait().await.unwrap();

    assert_eq!(status, RegistrationStatus::Added);
    assert_eq!(*probe.outstanding_during_insert.lock(), vec![1]);
    assert_eq!(ledger.allocated(), 1);
    assert_eq!(ledger.released(), 1);
}

#[tokio::test]
async fn failed_insertion_still_releases_once() {
    let ledger = BufferLedger::new();
    let mut probe = ProbeLibrary::new(ledger.clone());
    probe.fail = true;
    let registrar = MarkerRegistrar::with_ledger(Arc::new(probe), ledger.clone());

    let status = registrar.register(photo(8, 8), 0.1).await.unwrap();

    assert_eq!(
        status,
        RegistrationStatus::ValidationFailed(ValidationError::EmptyImage)
    );
    assert_eq!(ledger.released(), 1);
}

#[tokio::test]
async fn panicking_library_still_releases_once() {
    let ledger = BufferLedger::new();
    let mut probe = ProbeLibrary::new(ledger.clone());
    probe.panic = true;
    let registrar = MarkerRegistrar::with_ledger(Arc::new(probe), ledger.clone());

    let err = registrar.register(photo(8, 8), 0.1).await.unwrap_err();

    assert!(matches!(err, RegistrationError::TaskAborted { .. }));
    assert_eq!(ledger.allocated(), 1);
    assert_eq!(ledger.released(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn many_registrations_balance_the_ledger() {
    let library = Arc::new(RuntimeMarkerLibrary::new("runtime"));
    let registrar = MarkerRegistrar::new(library.clone());

    let handles: Vec<_> = (0..16)
        .map(|_| registrar.submit(photo(16, 12), 0.1).unwrap())
        .collect();
    for handle in handles {
        assert_eq!(handle.wait().await.unwrap(), RegistrationStatus::Added);
    }

    assert_eq!(library.len(), 16);
    assert_eq!(registrar.ledger().allocated(), 16);
    assert_eq!(registrar.ledger().released(), 16);
}

#[tokio::test]
async fn stored_descriptor_keeps_aspect_ratio() {
    let library = Arc::new(RuntimeMarkerLibrary::new("runtime"));
    let registrar = MarkerRegistrar::new(library.clone());
    let image = photo(64, 48);
    let marker = MarkerId::from(image.id);

    registrar.register(image, 0.1).await.unwrap();

    let entry = library.entry(&marker).expect("entry");
    approx::assert_relative_eq!(entry.descriptor.size.width, 0.1);
    approx::assert_relative_eq!(entry.descriptor.size.height, 0.075, epsilon = 1e-6);
    assert_eq!(entry.size, PixelSize::new(64, 48));
    assert!(entry.descriptor.guid.is_none());
}
