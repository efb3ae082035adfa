//! Owned grayscale pixel buffers with release accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use snapmark_core::{GrayImage, PixelSize};

#[derive(Debug, Default)]
struct LedgerCounts {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

/// Shared counters of buffer allocations and releases.
///
/// Cloning a ledger shares the counters.
#[derive(Clone, Debug, Default)]
pub struct BufferLedger {
    counts: Arc<LedgerCounts>,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated(&self) -> usize {
        self.counts.allocated.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counts.released.load(Ordering::SeqCst)
    }

    /// Buffers allocated but not yet released.
    ///
    /// `released` is read first: every release follows its allocation, so a
    /// later read of `allocated` is never smaller.
    pub fn outstanding(&self) -> usize {
        let released = self.released();
        self.allocated().saturating_sub(released)
    }
}

/// Grayscale pixels handed to a marker library.
///
/// The buffer is released when dropped. Whoever owns it last releases it,
/// so ownership transfer is the only way to hand it on.
#[derive(Debug)]
pub struct GrayscaleBuffer {
    size: PixelSize,
    data: Vec<u8>,
    ledger: BufferLedger,
}

impl GrayscaleBuffer {
    /// Take ownership of `image` pixels and record the allocation.
    pub fn allocate(image: GrayImage, ledger: &BufferLedger) -> Self {
        ledger.counts.allocated.fetch_add(1, Ordering::SeqCst);
        debug!(
            "grayscale buffer allocated ({}x{}, {} bytes)",
            image.size.width,
            image.size.height,
            image.data.len()
        );
        Self {
            size: image.size,
            data: image.data,
            ledger: ledger.clone(),
        }
    }

    #[inline]
    pub fn size(&self) -> PixelSize {
        self.size
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for GrayscaleBuffer {
    fn drop(&mut self) {
        self.data = Vec::new();
        self.ledger.counts.released.fetch_add(1, Ordering::SeqCst);
        debug!("grayscale buffer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32) -> GrayImage {
        GrayImage {
            size: PixelSize::new(w, h),
            data: vec![7; (w * h) as usize],
        }
    }

    #[test]
    fn drop_releases_once() {
        let ledger = BufferLedger::new();
        let buf = GrayscaleBuffer::allocate(gray(4, 2), &ledger);
        assert_eq!(buf.len(), 8);
        assert_eq!(ledger.outstanding(), 1);
        drop(buf);
        assert_eq!(ledger.allocated(), 1);
        assert_eq!(ledger.released(), 1);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn moved_buffer_is_released_by_its_new_owner() {
        let ledger = BufferLedger::new();
        let buf = GrayscaleBuffer::allocate(gray(2, 2), &ledger);
        let moved = std::thread::spawn(move || buf.bytes().len()).join().unwrap();
        assert_eq!(moved, 4);
        assert_eq!(ledger.released(), 1);
    }

    #[test]
    fn outstanding_stays_consistent_under_concurrent_churn() {
        let ledger = BufferLedger::new();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        drop(GrayscaleBuffer::allocate(gray(2, 2), &ledger));
                    }
                })
            })
            .collect();

        while workers.iter().any(|w| !w.is_finished()) {
            let outstanding = ledger.outstanding();
            assert!(outstanding <= ledger.allocated());
        }
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(ledger.allocated(), 8_000);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn ledger_clones_share_counts() {
        let ledger = BufferLedger::new();
        let view = ledger.clone();
        drop(GrayscaleBuffer::allocate(gray(1, 1), &ledger));
        drop(GrayscaleBuffer::allocate(gray(1, 1), &ledger));
        assert_eq!(view.allocated(), 2);
        assert_eq!(view.released(), 2);
    }
}
