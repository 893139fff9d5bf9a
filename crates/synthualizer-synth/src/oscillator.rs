//! Audio-rate oscillators with PolyBLEP anti-aliasing.
//!
//! Every voice generator is built from one or two [`Oscillator`]s. The
//! oscillator keeps a normalized phase accumulator and can either run at a
//! fixed frequency ([`advance`](Oscillator::advance)) or follow an
//! instantaneous frequency supplied per sample
//! ([`advance_at`](Oscillator::advance_at)), which is how the FM carrier is
//! driven.

use core::f32::consts::TAU;
use core::fmt;
use core::str::FromStr;

use libm::{fabsf, floorf, sinf};

/// Oscillator waveform shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Waveform {
    /// Pure fundamental.
    #[default]
    Sine,
    /// Odd harmonics, hollow timbre.
    Square,
    /// All harmonics, bright timbre.
    Sawtooth,
    /// Odd harmonics rolling off fast, soft timbre.
    Triangle,
}

impl Waveform {
    /// All waveforms, in display order.
    pub const ALL: [Waveform; 4] = [Self::Sine, Self::Square, Self::Sawtooth, Self::Triangle];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized waveform name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseWaveformError;

impl fmt::Display for ParseWaveformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of sine, square, sawtooth, triangle")
    }
}

impl FromStr for Waveform {
    type Err = ParseWaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("saw") {
            return Ok(Self::Sawtooth);
        }
        Self::ALL
            .into_iter()
            .find(|w| s.eq_ignore_ascii_case(w.as_str()))
            .ok_or(ParseWaveformError)
    }
}

/// Band-limited oscillator.
///
/// # Example
///
/// ```rust
/// use synthualizer_synth::{Oscillator, Waveform};
///
/// let mut osc = Oscillator::new(48000.0);
/// osc.set_frequency(110.0);
/// osc.set_waveform(Waveform::Sawtooth);
///
/// let sample = osc.advance();
/// assert!(sample.abs() <= 1.1);
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Normalized phase in [0, 1)
    phase: f32,
    frequency: f32,
    sample_rate: f32,
    waveform: Waveform,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Oscillator {
    /// Create a 440 Hz sine oscillator.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            frequency: 440.0,
            sample_rate: sample_rate.max(1.0),
            waveform: Waveform::Sine,
        }
    }

    /// Set the frequency in Hz.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz;
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Change the waveform without resetting phase.
    ///
    /// Switching mid-note keeps the phase running so the change does not
    /// click beyond the unavoidable timbre step.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Normalized phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Reset phase to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Produce one sample at the configured frequency.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.advance_at(self.frequency)
    }

    /// Produce one sample at an instantaneous frequency.
    ///
    /// Negative frequencies run the phase backwards, which happens when deep
    /// frequency modulation pushes the carrier through zero.
    #[inline]
    pub fn advance_at(&mut self, freq_hz: f32) -> f32 {
        let inc = freq_hz / self.sample_rate;
        let dt = fabsf(inc).clamp(1e-7, 0.5);
        let out = self.render(self.phase, dt);
        self.phase = wrap_phase(self.phase + inc);
        out
    }

    #[inline]
    fn render(&self, phase: f32, dt: f32) -> f32 {
        match self.waveform {
            Waveform::Sine => sinf(phase * TAU),
            Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            Waveform::Square => square(phase, dt),
            // Harmonics already fall at 12 dB/oct, the naive shape is clean enough
            Waveform::Triangle => 1.0 - 4.0 * fabsf(phase - 0.5),
        }
    }
}

#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase - floorf(phase);
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

#[inline]
fn square(phase: f32, dt: f32) -> f32 {
    let naive = if phase < 0.5 { 1.0 } else { -1.0 };
    naive + poly_blep(phase, dt) - poly_blep(wrap_phase(phase + 0.5), dt)
}

/// 4th-order PolyBLEP residual.
///
/// Piecewise polynomial fit to the ideal band-limited step residual over two
/// samples either side of a discontinuity, C2-continuous at the piece
/// boundary. Reference: Valimaki et al., "Antialiasing Oscillators", IEEE
/// Signal Processing Magazine, 2010.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    const A4: f32 = -43.0 / 48.0;
    const A3: f32 = 7.0 / 6.0;
    const A2: f32 = 0.5;
    const A0: f32 = -1.0;
    const C: f32 = -11.0 / 48.0;

    let residual = |n: f32| {
        if n < 1.0 {
            let n2 = n * n;
            A4 * n2 * n2 + A3 * n2 * n + A2 * n2 + A0
        } else {
            let u = 2.0 - n;
            let u2 = u * u;
            C * u2 * u2
        }
    };

    let window = 2.0 * dt;
    if t < window {
        residual(t / dt)
    } else if t > 1.0 - window {
        -residual((1.0 - t) / dt)
    } else {
        0.0
    }
}
