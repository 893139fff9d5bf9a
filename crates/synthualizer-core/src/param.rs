//! Linear parameter smoothing for the shared processing stage.
//!
//! Filter cutoff, resonance and master gain are changed from the control
//! thread at arbitrary moments. Applying a new value in a single step causes
//! audible stepping ("zipper noise"), so the renderer moves towards each new
//! target over a short fixed ramp instead.
//!
//! ```rust
//! use synthualizer_core::LinearSmoothedParam;
//!
//! let mut cutoff = LinearSmoothedParam::with_config(1000.0, 48000.0, 50.0);
//! cutoff.set_target(2000.0);
//!
//! // 50 ms at 48 kHz
//! for _ in 0..2400 {
//!     cutoff.advance();
//! }
//! assert_eq!(cutoff.get(), 2000.0);
//! ```

/// Default ramp length for shared-stage parameters.
pub const DEFAULT_RAMP_MS: f32 = 50.0;

/// A value that moves towards its target at a constant rate.
///
/// Retargeting mid-ramp starts a fresh ramp from the current value, so the
/// output never jumps.
#[derive(Debug, Clone)]
pub struct LinearSmoothedParam {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
    sample_rate: f32,
    ramp_ms: f32,
}

impl LinearSmoothedParam {
    /// Create a settled parameter using [`DEFAULT_RAMP_MS`] at 48 kHz.
    pub fn new(initial: f32) -> Self {
        Self::with_config(initial, 48000.0, DEFAULT_RAMP_MS)
    }

    /// Create a settled parameter with an explicit sample rate and ramp time.
    pub fn with_config(initial: f32, sample_rate: f32, ramp_ms: f32) -> Self {
        let mut param = Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
            sample_rate,
            ramp_ms,
        };
        param.recalculate();
        param
    }

    /// Start ramping towards `target`.
    ///
    /// Non-finite targets are ignored.
    pub fn set_target(&mut self, target: f32) {
        if !target.is_finite() || target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.snap_to_target();
        } else {
            self.step = (target - self.current) / self.ramp_samples as f32;
            self.remaining = self.ramp_samples;
        }
    }

    /// Jump to `value` without ramping.
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.snap_to_target();
    }

    /// Change the sample rate. Takes effect on the next retarget.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate();
    }

    /// Change the ramp length in milliseconds. Takes effect on the next retarget.
    pub fn set_ramp_ms(&mut self, ramp_ms: f32) {
        self.ramp_ms = ramp_ms;
        self.recalculate();
    }

    /// Ramp length in samples.
    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being ramped towards.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// `true` once the ramp has arrived.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    /// Finish the current ramp immediately.
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.step = 0.0;
        self.remaining = 0;
    }

    fn recalculate(&mut self) {
        let samples = self.ramp_ms.max(0.0) / 1000.0 * self.sample_rate.max(0.0);
        self.ramp_samples = libm::roundf(samples) as u32;
    }
}

impl Default for LinearSmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrives_after_ramp() {
        let mut param = LinearSmoothedParam::with_config(0.0, 48000.0, 50.0);
        param.set_target(1.0);
        assert_eq!(param.ramp_samples(), 2400);

        for _ in 0..2399 {
            param.advance();
        }
        assert!(!param.is_settled());
        assert_eq!(param.advance(), 1.0);
        assert!(param.is_settled());
    }

    #[test]
    fn test_constant_rate() {
        let mut param = LinearSmoothedParam::with_config(0.0, 48000.0, 10.0);
        param.set_target(1.0);
        for _ in 0..240 {
            param.advance();
        }
        assert!((param.get() - 0.5).abs() < 0.01, "halfway, got {}", param.get());
    }

    #[test]
    fn test_retarget_mid_ramp_is_continuous() {
        let mut param = LinearSmoothedParam::with_config(0.0, 1000.0, 10.0);
        param.set_target(1.0);
        for _ in 0..5 {
            param.advance();
        }
        let before = param.get();
        param.set_target(0.0);
        let after = param.advance();
        assert!((after - before).abs() < 0.11, "no jump: {before} -> {after}");
    }

    #[test]
    fn test_zero_ramp_is_instant() {
        let mut param = LinearSmoothedParam::with_config(0.0, 48000.0, 0.0);
        param.set_target(3.0);
        assert_eq!(param.get(), 3.0);
        assert!(param.is_settled());
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut param = LinearSmoothedParam::new(0.5);
        param.set_target(f32::NAN);
        assert_eq!(param.target(), 0.5);
        assert!(param.is_settled());
    }
}
