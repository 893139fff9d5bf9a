//! State Variable Filter for the shared post-mix stage.
//!
//! Implements the Topology-Preserving Transform (TPT) SVF after Zavalishin,
//! "The Art of VA Filter Design". The trapezoidal integrators keep the analog
//! response and stay stable while cutoff is swept every sample, which is
//! exactly what the smoothed cutoff ramp does.
//!
//! The filter computes lowpass, highpass, bandpass and notch in one pass; the
//! configured [`SvfOutput`] selects which one [`process`](StateVariableFilter::process)
//! returns.

use core::f32::consts::PI;
use core::fmt;
use core::str::FromStr;

use crate::math::{fast_tan, flush_denormal};

/// Filter response selected from the SVF outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SvfOutput {
    /// Passes frequencies below the cutoff.
    #[default]
    Lowpass,
    /// Passes frequencies above the cutoff.
    Highpass,
    /// Passes frequencies near the cutoff.
    Bandpass,
    /// Rejects frequencies near the cutoff.
    Notch,
}

impl SvfOutput {
    /// Lowercase name, matching what [`FromStr`] accepts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Notch => "notch",
        }
    }
}

impl fmt::Display for SvfOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a filter type name is not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseSvfOutputError;

impl fmt::Display for ParseSvfOutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of lowpass, highpass, bandpass, notch")
    }
}

impl FromStr for SvfOutput {
    type Err = ParseSvfOutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const NAMES: [(&str, SvfOutput); 7] = [
            ("lowpass", SvfOutput::Lowpass),
            ("lp", SvfOutput::Lowpass),
            ("highpass", SvfOutput::Highpass),
            ("hp", SvfOutput::Highpass),
            ("bandpass", SvfOutput::Bandpass),
            ("bp", SvfOutput::Bandpass),
            ("notch", SvfOutput::Notch),
        ];
        let s = s.trim();
        NAMES
            .iter()
            .find(|(name, _)| s.eq_ignore_ascii_case(name))
            .map(|&(_, output)| output)
            .ok_or(ParseSvfOutputError)
    }
}

/// 2-pole (12 dB/oct) TPT state-variable filter.
///
/// ## Parameters
///
/// - `cutoff`: Hz, clamped to 20.0 ..= sr x 0.49 (default 1000.0)
/// - `resonance`: Q, clamped to 0.1 ..= 20.0 (default 0.707)
/// - `output`: selected response (default lowpass)
///
/// # Example
///
/// ```rust
/// use synthualizer_core::{StateVariableFilter, SvfOutput};
///
/// let mut svf = StateVariableFilter::new(48000.0);
/// svf.set_cutoff(2000.0);
/// svf.set_resonance(1.0);
/// svf.set_output(SvfOutput::Lowpass);
///
/// let y = svf.process(0.5);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    ic1eq: f32,
    ic2eq: f32,
    g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
    resonance: f32,
    output: SvfOutput,
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl StateVariableFilter {
    /// Create a lowpass filter at 1 kHz, Q 0.707.
    pub fn new(sample_rate: f32) -> Self {
        let mut svf = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
            resonance: 0.707,
            output: SvfOutput::Lowpass,
        };
        svf.update_coefficients();
        svf
    }

    /// Set cutoff in Hz.
    pub fn set_cutoff(&mut self, freq: f32) {
        let clamped = freq.clamp(20.0, self.sample_rate * 0.49);
        if clamped != self.cutoff {
            self.cutoff = clamped;
            self.update_coefficients();
        }
    }

    /// Cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Set resonance (Q).
    pub fn set_resonance(&mut self, q: f32) {
        let clamped = q.clamp(0.1, 20.0);
        if clamped != self.resonance {
            self.resonance = clamped;
            self.update_coefficients();
        }
    }

    /// Resonance (Q).
    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Select the response returned by [`process`](Self::process).
    pub fn set_output(&mut self, output: SvfOutput) {
        self.output = output;
    }

    /// Selected response.
    pub fn output(&self) -> SvfOutput {
        self.output
    }

    /// Clear the integrator state.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    // fast_tan loses accuracy near its pole, so high cutoffs use tanf
    fn update_coefficients(&mut self) {
        let arg = PI * self.cutoff / self.sample_rate;
        self.g = if self.cutoff < 10_000.0 {
            fast_tan(arg)
        } else {
            libm::tanf(arg)
        };
        self.k = 1.0 / self.resonance;
    }

    /// Process one sample, returning `(lowpass, highpass, bandpass, notch)`.
    pub fn process_all(&mut self, input: f32) -> (f32, f32, f32, f32) {
        let v3 = input - self.ic2eq;
        let v1 = (self.g * v3 + self.ic1eq) / (1.0 + self.g * (self.g + self.k));
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);

        let lp = v2;
        let hp = input - self.k * v1 - v2;
        (lp, hp, v1, lp + hp)
    }

    /// Process one sample through the selected response.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let (lp, hp, bp, notch) = self.process_all(input);
        match self.output {
            SvfOutput::Lowpass => lp,
            SvfOutput::Highpass => hp,
            SvfOutput::Bandpass => bp,
            SvfOutput::Notch => notch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(svf: &mut StateVariableFilter, input: f32, samples: usize) -> f32 {
        let mut out = 0.0;
        for _ in 0..samples {
            out = svf.process(input);
        }
        out
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_cutoff(1000.0);
        let out = settle(&mut svf, 1.0, 10_000);
        assert!((out - 1.0).abs() < 0.01, "DC through lowpass, got {out}");
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_output(SvfOutput::Highpass);
        let out = settle(&mut svf, 1.0, 10_000);
        assert!(out.abs() < 0.01, "DC through highpass, got {out}");
    }

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_cutoff(200.0);

        let mut peak = 0.0_f32;
        for n in 0..48000 {
            let x = libm::sinf(2.0 * PI * 8000.0 * n as f32 / 48000.0);
            let y = svf.process(x);
            if n > 4800 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.05, "8 kHz through 200 Hz lowpass, peak {peak}");
    }

    #[test]
    fn test_parameter_clamping() {
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_cutoff(5.0);
        assert_eq!(svf.cutoff(), 20.0);
        svf.set_cutoff(40_000.0);
        assert!((svf.cutoff() - 48000.0 * 0.49).abs() < 1e-3);
        svf.set_resonance(0.0);
        assert_eq!(svf.resonance(), 0.1);
        svf.set_resonance(100.0);
        assert_eq!(svf.resonance(), 20.0);
    }

    #[test]
    fn test_output_from_str() {
        assert_eq!("lowpass".parse(), Ok(SvfOutput::Lowpass));
        assert_eq!("HighPass".parse(), Ok(SvfOutput::Highpass));
        assert_eq!("bandpass".parse(), Ok(SvfOutput::Bandpass));
        assert_eq!(" notch ".parse(), Ok(SvfOutput::Notch));
        assert_eq!("allpass".parse::<SvfOutput>(), Err(ParseSvfOutputError));
        for output in [
            SvfOutput::Lowpass,
            SvfOutput::Highpass,
            SvfOutput::Bandpass,
            SvfOutput::Notch,
        ] {
            assert_eq!(output.as_str().parse(), Ok(output));
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut svf = StateVariableFilter::new(48000.0);
        settle(&mut svf, 1.0, 100);
        svf.reset();
        assert_eq!(svf.process(0.0), 0.0);
    }
}
