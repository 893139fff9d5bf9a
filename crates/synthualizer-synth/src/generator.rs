//! Per-voice sound generators.
//!
//! A [`GeneratorPatch`] is the control-side description of what a voice
//! should sound like; a [`Generator`] is the render-side unit built from it.
//! Generators are single-use: every (re)trigger builds a fresh one, and it is
//! discarded once its voice's release tail has elapsed.

use crate::oscillator::{Oscillator, Waveform};

/// FM settings: a modulator driving the carrier's frequency.
///
/// The modulator runs at `carrier x ratio`; its output, scaled by
/// `index x carrier`, is added to the carrier's instantaneous frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmPatch {
    /// Carrier waveform.
    pub carrier: Waveform,
    /// Modulator waveform.
    pub modulator: Waveform,
    /// Modulator frequency as a multiple of the carrier frequency.
    pub ratio: f32,
    /// Modulation depth as a multiple of the carrier frequency.
    pub index: f32,
}

impl Default for FmPatch {
    fn default() -> Self {
        Self {
            carrier: Waveform::Sine,
            modulator: Waveform::Sine,
            ratio: 2.0,
            index: 1.0,
        }
    }
}

/// What a voice's generator is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorPatch {
    /// One oscillator.
    Subtractive {
        /// Oscillator waveform.
        waveform: Waveform,
    },
    /// Two-operator FM.
    Fm(FmPatch),
}

impl Default for GeneratorPatch {
    fn default() -> Self {
        Self::Subtractive {
            waveform: Waveform::Sine,
        }
    }
}

impl GeneratorPatch {
    /// The waveform a listener hears: the oscillator, or the FM carrier.
    pub fn waveform(&self) -> Waveform {
        match self {
            Self::Subtractive { waveform } => *waveform,
            Self::Fm(fm) => fm.carrier,
        }
    }
}

/// Render-side generator for one note.
///
/// # Example
///
/// ```rust
/// use synthualizer_synth::{Generator, GeneratorPatch, FmPatch};
///
/// let mut generator = Generator::new(GeneratorPatch::Fm(FmPatch::default()), 220.0, 48000.0);
/// let sample = generator.next_sample();
/// assert!(sample.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Generator {
    patch: GeneratorPatch,
    frequency: f32,
    carrier: Oscillator,
    modulator: Oscillator,
}

impl Generator {
    /// Build a generator sounding `frequency` Hz.
    pub fn new(patch: GeneratorPatch, frequency: f32, sample_rate: f32) -> Self {
        let mut generator = Self {
            patch,
            frequency,
            carrier: Oscillator::new(sample_rate),
            modulator: Oscillator::new(sample_rate),
        };
        generator.carrier.set_frequency(frequency);
        generator.set_patch(patch);
        generator
    }

    /// Adopt a new patch in place, keeping oscillator phases.
    pub fn set_patch(&mut self, patch: GeneratorPatch) {
        self.patch = patch;
        match patch {
            GeneratorPatch::Subtractive { waveform } => self.carrier.set_waveform(waveform),
            GeneratorPatch::Fm(fm) => {
                self.carrier.set_waveform(fm.carrier);
                self.modulator.set_waveform(fm.modulator);
            }
        }
    }

    /// Current patch.
    pub fn patch(&self) -> GeneratorPatch {
        self.patch
    }

    /// Note frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Produce the next sample, before the voice gain is applied.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.patch {
            GeneratorPatch::Subtractive { .. } => self.carrier.advance(),
            GeneratorPatch::Fm(fm) => {
                let f = self.frequency;
                let m = self.modulator.advance_at(f * fm.ratio);
                self.carrier.advance_at(f + fm.index * f * m)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtractive_matches_oscillator() {
        let patch = GeneratorPatch::Subtractive {
            waveform: Waveform::Sawtooth,
        };
        let mut generator = Generator::new(patch, 110.0, 48000.0);
        let mut osc = Oscillator::new(48000.0);
        osc.set_frequency(110.0);
        osc.set_waveform(Waveform::Sawtooth);

        for _ in 0..512 {
            assert_eq!(generator.next_sample(), osc.advance());
        }
    }

    #[test]
    fn test_fm_zero_index_is_plain_carrier() {
        let patch = GeneratorPatch::Fm(FmPatch {
            index: 0.0,
            ..FmPatch::default()
        });
        let mut generator = Generator::new(patch, 220.0, 48000.0);
        let mut osc = Oscillator::new(48000.0);
        osc.set_frequency(220.0);

        for _ in 0..512 {
            assert!((generator.next_sample() - osc.advance()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fm_modulation_changes_output() {
        let plain = GeneratorPatch::Fm(FmPatch {
            index: 0.0,
            ..FmPatch::default()
        });
        let deep = GeneratorPatch::Fm(FmPatch {
            index: 5.0,
            ..FmPatch::default()
        });
        let mut a = Generator::new(plain, 220.0, 48000.0);
        let mut b = Generator::new(deep, 220.0, 48000.0);

        let diff: f32 = (0..4800)
            .map(|_| (a.next_sample() - b.next_sample()).abs())
            .sum();
        assert!(diff > 10.0, "deep FM should diverge, diff {diff}");
    }

    #[test]
    fn test_set_patch_switches_waveform() {
        let mut generator = Generator::new(GeneratorPatch::default(), 100.0, 48000.0);
        generator.set_patch(GeneratorPatch::Subtractive {
            waveform: Waveform::Square,
        });
        assert_eq!(generator.patch().waveform(), Waveform::Square);
        assert_eq!(generator.frequency(), 100.0);
    }
}
