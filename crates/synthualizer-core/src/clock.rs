//! Audio-rendering clocks.
//!
//! All scheduling in the engine is expressed in seconds of *rendered audio*,
//! not wall-clock time. The render thread owns the authoritative position and
//! publishes it through a [`SampleClock`]; the control thread only ever reads
//! it.
//!
//! [`ManualClock`] implements the same [`Clock`] trait but is moved
//! explicitly, which lets tests place note events at exact instants.
//!
//! The renderer drains its command queue once per block, so an event stamped
//! with the block-start time can land up to a block late. [`LookaheadClock`]
//! reads a [`SampleClock`] one block ahead, which puts every control-side
//! event at or after the start of the next block to be rendered.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing audio time source.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Clock derived from the number of frames the renderer has produced.
///
/// # Example
///
/// ```rust
/// use synthualizer_core::{Clock, SampleClock};
///
/// let clock = SampleClock::new(48000.0);
/// clock.advance(24000);
/// assert!((clock.now() - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct SampleClock {
    frames: AtomicU64,
    last_block: AtomicU64,
    sample_rate: f64,
}

impl SampleClock {
    /// Create a clock at frame zero.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            last_block: AtomicU64::new(0),
            sample_rate: f64::from(sample_rate.max(1.0)),
        }
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Length in frames of the most recently rendered block.
    pub fn last_block(&self) -> u64 {
        self.last_block.load(Ordering::Acquire)
    }

    /// Move the clock forward by one rendered block of `frames` frames.
    pub fn advance(&self, frames: u64) {
        self.last_block.store(frames, Ordering::Release);
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Time in seconds at which `frame` starts.
    pub fn time_of_frame(&self, frame: u64) -> f64 {
        frame as f64 / self.sample_rate
    }

    /// First frame whose start time is at or after `time`.
    ///
    /// Negative times map to frame zero.
    pub fn frame_at(&self, time: f64) -> u64 {
        if time <= 0.0 || time.is_nan() {
            return 0;
        }
        libm::ceil(time * self.sample_rate - 1e-9) as u64
    }
}

impl Clock for SampleClock {
    fn now(&self) -> f64 {
        self.time_of_frame(self.frames())
    }
}

/// A [`SampleClock`] read one block ahead of the renderer.
///
/// Before the first block has been rendered it reads the same as the clock
/// it wraps.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use synthualizer_core::{Clock, LookaheadClock, SampleClock};
///
/// let frames = Arc::new(SampleClock::new(1000.0));
/// let clock = LookaheadClock::new(Arc::clone(&frames));
/// assert_eq!(clock.now(), 0.0);
///
/// frames.advance(100);
/// assert!((clock.now() - 0.2).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct LookaheadClock {
    frames: Arc<SampleClock>,
}

impl LookaheadClock {
    /// Wrap `frames`.
    pub fn new(frames: Arc<SampleClock>) -> Self {
        Self { frames }
    }

    /// The clock being read ahead of.
    pub fn inner(&self) -> &Arc<SampleClock> {
        &self.frames
    }
}

impl Clock for LookaheadClock {
    fn now(&self) -> f64 {
        let frames = self.frames.frames() + self.frames.last_block();
        self.frames.time_of_frame(frames)
    }
}

/// Clock that only moves when told to.
///
/// Stores the time as `f64` bits in an atomic so it can be shared behind an
/// `Arc` like the real clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Create a clock at `time` seconds.
    pub fn new(time: f64) -> Self {
        Self {
            bits: AtomicU64::new(time.to_bits()),
        }
    }

    /// Jump to `time` seconds.
    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        let next = self.now() + seconds;
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
