//! Analysis tap: a lock-free view of the most recent post-mix samples.
//!
//! The renderer pushes every output sample into a fixed ring of atomics. A
//! visualizer holding an [`AnalysisTap`] copies the latest window out on its
//! own schedule. Neither side ever waits for the other; a snapshot taken
//! while the renderer is writing may mix samples from two adjacent blocks,
//! which is harmless for display.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Default number of samples kept by the tap.
pub const DEFAULT_TAP_SIZE: usize = 2048;

#[derive(Debug)]
struct TapRing {
    samples: Box<[AtomicU32]>,
    written: AtomicU64,
}

/// Read-only handle to recent post-mix audio.
///
/// Cloning is cheap; all clones observe the same ring.
///
/// # Example
///
/// ```rust
/// use synthualizer_synth::AnalysisTap;
///
/// let tap = AnalysisTap::new(1024);
/// let mut window = vec![0.0; 512];
/// let filled = tap.snapshot(&mut window);
/// assert_eq!(filled, 0); // nothing rendered yet
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisTap {
    ring: Arc<TapRing>,
}

impl AnalysisTap {
    /// Create a tap holding `size` samples (at least one).
    pub fn new(size: usize) -> Self {
        let samples = (0..size.max(1)).map(|_| AtomicU32::new(0)).collect();
        Self {
            ring: Arc::new(TapRing {
                samples,
                written: AtomicU64::new(0),
            }),
        }
    }

    /// Number of samples the ring holds.
    pub fn capacity(&self) -> usize {
        self.ring.samples.len()
    }

    /// Total samples written since creation.
    pub fn samples_written(&self) -> u64 {
        self.ring.written.load(Ordering::Acquire)
    }

    /// Copy the most recent samples into `out`, oldest first.
    ///
    /// Fills the *end* of `out` with up to `min(out.len(), capacity)`
    /// samples and zeroes anything before them. Returns how many samples were
    /// copied. Never blocks.
    pub fn snapshot(&self, out: &mut [f32]) -> usize {
        let cap = self.capacity();
        let written = self.samples_written();
        let available = written.min(cap as u64) as usize;
        let n = out.len().min(available);

        let lead = out.len() - n;
        out[..lead].fill(0.0);

        let start = written - n as u64;
        for (i, slot) in out[lead..].iter_mut().enumerate() {
            let pos = ((start + i as u64) % cap as u64) as usize;
            *slot = f32::from_bits(self.ring.samples[pos].load(Ordering::Relaxed));
        }
        n
    }

    /// Convenience wrapper returning the latest `len` samples as a new vector.
    pub fn latest(&self, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        self.snapshot(&mut out);
        out
    }

    /// Writer end, held by the renderer.
    pub(crate) fn writer(&self) -> TapWriter {
        TapWriter {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl Default for AnalysisTap {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_SIZE)
    }
}

/// Renderer-side writer. There is exactly one per tap.
#[derive(Debug)]
pub(crate) struct TapWriter {
    ring: Arc<TapRing>,
}

impl TapWriter {
    #[inline]
    pub(crate) fn push(&mut self, sample: f32) {
        let written = self.ring.written.load(Ordering::Relaxed);
        let pos = (written % self.ring.samples.len() as u64) as usize;
        self.ring.samples[pos].store(sample.to_bits(), Ordering::Relaxed);
        self.ring.written.store(written + 1, Ordering::Release);
    }
}
