//! ADSR envelope scheduling.
//!
//! The envelope never computes samples itself. Instead it writes a gain
//! trajectory into anything [`Automatable`] and lets the render thread
//! evaluate it. Two entry points cover a note's whole life:
//!
//! - [`schedule_attack_decay`] on trigger: 0 -> peak (linear) -> sustain
//! - [`schedule_release`] on release: current value -> floor (exponential)
//!
//! Both cancel whatever was pending and re-anchor at `now` before scheduling,
//! so a transition can interrupt any phase without a jump.
//!
//! ## Numeric policy
//!
//! Exponential ramps need strictly positive endpoints. Targets below
//! [`EXP_FLOOR`] are clamped to it, and transitions that start at or pass
//! through zero use linear ramps instead.
//!
//! ## Stage tracking
//!
//! The stage a voice is in is not stored; [`EnvelopeTimeline`] records the
//! trigger and release instants together with the timing in force at each,
//! and derives the stage for any query time.

use synthualizer_core::{Automatable, AutomationOp};

/// Lowest value an exponential ramp is allowed to target.
pub const EXP_FLOOR: f32 = 0.001;

/// Sustain gains below this decay linearly rather than exponentially.
pub const LINEAR_DECAY_THRESHOLD: f32 = 0.01;

/// Stage durations at or below this many seconds are treated as instant.
pub const TIME_EPSILON: f64 = 1e-4;

/// ADSR envelope stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// No note, or the release tail has finished.
    #[default]
    Idle,
    /// Rising linearly from 0 to peak.
    Attack,
    /// Falling from peak to the sustain level.
    Decay,
    /// Holding the sustain level until release.
    Sustain,
    /// Falling from the release-time value to silence.
    Release,
}

impl EnvelopeStage {
    /// `true` for every stage except [`Idle`](Self::Idle).
    pub fn is_sounding(self) -> bool {
        self != Self::Idle
    }
}

/// Engine-wide ADSR timing.
///
/// Times are in seconds, sustain is a fraction of peak. Setters clamp
/// negative times to zero and sustain into `[0, 1]`; non-finite input is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrConfig {
    attack: f64,
    decay: f64,
    sustain: f32,
    release: f64,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self::new(0.01, 0.1, 0.7, 0.3)
    }
}

impl AdsrConfig {
    /// Create a configuration, clamping out-of-range values.
    pub fn new(attack: f64, decay: f64, sustain: f32, release: f64) -> Self {
        let mut adsr = Self {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
        };
        adsr.set_attack(attack);
        adsr.set_decay(decay);
        adsr.set_sustain(sustain);
        adsr.set_release(release);
        adsr
    }

    /// Attack time in seconds.
    pub fn attack(&self) -> f64 {
        self.attack
    }

    /// Decay time in seconds.
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Sustain level in `[0, 1]`.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Release time in seconds.
    pub fn release(&self) -> f64 {
        self.release
    }

    /// Set attack time in seconds.
    pub fn set_attack(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.attack = seconds.max(0.0);
        }
    }

    /// Set decay time in seconds.
    pub fn set_decay(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.decay = seconds.max(0.0);
        }
    }

    /// Set sustain level.
    pub fn set_sustain(&mut self, level: f32) {
        if level.is_finite() {
            self.sustain = level.clamp(0.0, 1.0);
        }
    }

    /// Set release time in seconds.
    pub fn set_release(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.release = seconds.max(0.0);
        }
    }
}

/// The instants that define one note's envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTimeline {
    triggered_at: f64,
    attack: f64,
    decay: f64,
    released: Option<(f64, f64)>,
}

impl EnvelopeTimeline {
    /// Start a timeline at `time` using the attack/decay of `adsr`.
    pub fn triggered(time: f64, adsr: &AdsrConfig) -> Self {
        Self {
            triggered_at: time,
            attack: adsr.attack(),
            decay: adsr.decay(),
            released: None,
        }
    }

    /// Mark the release at `time`, lasting `release` seconds.
    ///
    /// A second release is ignored; the first one already owns the tail.
    pub fn release(&mut self, time: f64, release: f64) {
        if self.released.is_none() {
            self.released = Some((time, release.max(0.0)));
        }
    }

    /// Trigger time in seconds.
    pub fn triggered_at(&self) -> f64 {
        self.triggered_at
    }

    /// Release time in seconds, if released.
    pub fn released_at(&self) -> Option<f64> {
        self.released.map(|(at, _)| at)
    }

    /// Time the release tail finishes, if released.
    pub fn ends_at(&self) -> Option<f64> {
        self.released.map(|(at, len)| at + len)
    }

    /// Stage at `time`.
    pub fn stage_at(&self, time: f64) -> EnvelopeStage {
        if let Some((at, len)) = self.released
            && time >= at
        {
            return if time < at + len {
                EnvelopeStage::Release
            } else {
                EnvelopeStage::Idle
            };
        }

        let elapsed = time - self.triggered_at;
        if elapsed < 0.0 {
            EnvelopeStage::Idle
        } else if elapsed < self.attack {
            EnvelopeStage::Attack
        } else if elapsed < self.attack + self.decay {
            EnvelopeStage::Decay
        } else {
            EnvelopeStage::Sustain
        }
    }
}

/// Schedule attack and decay on `gain` starting at `now`.
///
/// Cancels anything pending from `now`, sets 0 at `now`, ramps linearly to
/// `peak` over `attack`, then falls to `sustain_gain` over `decay`. The fall
/// is exponential unless `sustain_gain` is below [`LINEAR_DECAY_THRESHOLD`]
/// (or `peak` is below [`EXP_FLOOR`]), in which case it is linear. A
/// near-zero `decay` jumps straight to the sustain level.
///
/// # Example
///
/// ```rust
/// use synthualizer_core::{Automatable, AutomationCurve};
/// use synthualizer_synth::envelope::schedule_attack_decay;
///
/// let mut gain = AutomationCurve::new(0.0);
/// schedule_attack_decay(&mut gain, 0.0, 1.0, 0.5, 0.1, 0.1);
///
/// assert!(gain.value_at(0.05) < gain.value_at(0.1));
/// assert!((gain.value_at(0.2) - 0.5).abs() < 1e-6);
/// ```
pub fn schedule_attack_decay<A: Automatable + ?Sized>(
    gain: &mut A,
    now: f64,
    peak: f32,
    sustain_gain: f32,
    attack: f64,
    decay: f64,
) {
    gain.apply(AutomationOp::CancelFrom { time: now });
    gain.apply(AutomationOp::SetValue {
        value: 0.0,
        time: now,
    });

    let attack_end = now + attack.max(0.0);
    if attack > TIME_EPSILON {
        gain.apply(AutomationOp::LinearRamp {
            value: peak,
            end_time: attack_end,
        });
    } else {
        gain.apply(AutomationOp::SetValue {
            value: peak,
            time: attack_end,
        });
    }

    if decay > TIME_EPSILON {
        let end_time = attack_end + decay;
        if sustain_gain < LINEAR_DECAY_THRESHOLD || peak < EXP_FLOOR {
            gain.apply(AutomationOp::LinearRamp {
                value: sustain_gain,
                end_time,
            });
        } else {
            gain.apply(AutomationOp::ExponentialRamp {
                value: sustain_gain.max(EXP_FLOOR),
                end_time,
            });
        }
    } else {
        gain.apply(AutomationOp::SetValue {
            value: sustain_gain,
            time: attack_end,
        });
    }
}

/// Schedule a release on `gain` starting at `now`.
///
/// Reads the value at `now` (whatever phase the envelope is in), cancels
/// pending automation, re-anchors at `now` with that value, then ramps
/// exponentially to [`EXP_FLOOR`] over `release`. If the captured value is
/// already below the floor the ramp is linear to zero; a near-zero `release`
/// drops to zero immediately.
///
/// Returns the captured starting value.
///
/// # Example
///
/// ```rust
/// use synthualizer_core::{Automatable, AutomationCurve};
/// use synthualizer_synth::envelope::{schedule_attack_decay, schedule_release};
///
/// let mut gain = AutomationCurve::new(0.0);
/// schedule_attack_decay(&mut gain, 0.0, 1.0, 0.5, 0.1, 0.1);
///
/// // Released halfway up the attack: the tail starts at 0.5, not at peak
/// let start = schedule_release(&mut gain, 0.05, 0.3);
/// assert!((start - 0.5).abs() < 1e-6);
/// assert!((gain.value_at(0.05) - 0.5).abs() < 1e-6);
/// ```
pub fn schedule_release<A: Automatable + ?Sized>(gain: &mut A, now: f64, release: f64) -> f32 {
    let current = gain.value_at(now);

    gain.apply(AutomationOp::CancelFrom { time: now });
    gain.apply(AutomationOp::SetValue {
        value: current,
        time: now,
    });

    if release <= TIME_EPSILON {
        gain.apply(AutomationOp::SetValue {
            value: 0.0,
            time: now,
        });
    } else if current >= EXP_FLOOR {
        gain.apply(AutomationOp::ExponentialRamp {
            value: EXP_FLOOR,
            end_time: now + release,
        });
    } else {
        gain.apply(AutomationOp::LinearRamp {
            value: 0.0,
            end_time: now + release,
        });
    }

    current
}
