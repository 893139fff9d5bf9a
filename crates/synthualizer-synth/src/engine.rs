//! Polyphonic synthesis engine.
//!
//! [`SynthEngine`] is the surface collaborators talk to: note on/off,
//! parameter updates, the analysis tap and the active voice count. It owns
//! the [`VoicePool`] and the engine-wide settings, and forwards everything
//! audible to its [`RenderSink`] as timestamped commands.
//!
//! ## Variants
//!
//! | Variant | Per-voice generator | Shared stage |
//! |---------|---------------------|--------------|
//! | [`EngineVariant::Subtractive`] | one PolyBLEP oscillator | SVF filter, master gain |
//! | [`EngineVariant::Fm`] | two-operator FM | master gain (filter bypassed) |
//!
//! Both variants use the same pool, envelope and stealing rules. Several
//! engines can share one sink: each renders into its own lane, so their
//! voices and shared stages never interfere.
//!
//! ## Parameters
//!
//! - Generator parameters (waveform, FM ratio/index/waveforms) are stored for
//!   future notes and pushed to every voice that still has a generator.
//! - Envelope parameters change the ADSR used by notes triggered (or, for
//!   release, released) after the change.
//! - Filter and master gain go to the renderer, which smooths them.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use synthualizer_synth::{CommandLog, EngineSettings, SynthEngine};
//!
//! let sink = Arc::new(CommandLog::new(48000.0));
//! let mut engine = SynthEngine::new(Arc::clone(&sink), EngineSettings::default()).unwrap();
//!
//! engine.note_on(440.0, 1.0);
//! engine.apply_raw("cutoff", 800.0);
//! assert_eq!(engine.active_voice_count(), 1);
//!
//! engine.note_off(440.0);
//! sink.advance(1.0);
//! assert_eq!(engine.active_voice_count(), 0);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use synthualizer_core::SvfOutput;
use thiserror::Error;

use crate::context::{AudioContext, RenderSink};
use crate::envelope::AdsrConfig;
use crate::error::{EngineError, Result};
use crate::generator::{FmPatch, GeneratorPatch};
use crate::oscillator::Waveform;
use crate::params::{
    EngineParam, EnvelopeParam, FilterParam, FmParam, MixerParam, OscillatorParam, ParamError,
    ParamValue,
};
use crate::pool::{DEFAULT_CAPACITY, NoteOnOutcome, StealMode, VoicePool};
use crate::render::{LaneId, RenderCommand, SharedStage};
use crate::tap::AnalysisTap;
use crate::voice::{Trigger, VoiceId, VoiceSettings};

/// Lowest accepted filter cutoff in Hz.
pub const MIN_CUTOFF: f32 = 20.0;
/// Highest accepted filter cutoff in Hz.
pub const MAX_CUTOFF: f32 = 20000.0;
/// Lowest accepted resonance.
pub const MIN_RESONANCE: f32 = 0.1;
/// Highest accepted resonance.
pub const MAX_RESONANCE: f32 = 20.0;

/// Which synthesis method the engine uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineVariant {
    /// Oscillator into a shared filter.
    #[default]
    Subtractive,
    /// Two-operator frequency modulation.
    Fm,
}

impl EngineVariant {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subtractive => "subtractive",
            Self::Fm => "fm",
        }
    }
}

impl fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized engine variant name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown engine '{0}' (expected subtractive or fm)")]
pub struct ParseVariantError(pub String);

impl FromStr for EngineVariant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subtractive" | "sub" => Ok(Self::Subtractive),
            "fm" => Ok(Self::Fm),
            _ => Err(ParseVariantError(s.to_owned())),
        }
    }
}

/// Shared filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    /// Response type.
    pub filter_type: SvfOutput,
    /// Cutoff in Hz.
    pub cutoff: f32,
    /// Resonance (Q).
    pub resonance: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            filter_type: SvfOutput::Lowpass,
            cutoff: 2000.0,
            resonance: 1.0,
        }
    }
}

/// Everything needed to build an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Synthesis method.
    pub variant: EngineVariant,
    /// Number of voices.
    pub capacity: usize,
    /// Envelope timing.
    pub adsr: AdsrConfig,
    /// Subtractive oscillator waveform.
    pub waveform: Waveform,
    /// FM operator settings.
    pub fm: FmPatch,
    /// Shared filter (subtractive only).
    pub filter: FilterSettings,
    /// Output gain.
    pub master_gain: f32,
    /// How stolen voices are silenced.
    pub steal_mode: StealMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            variant: EngineVariant::Subtractive,
            capacity: DEFAULT_CAPACITY,
            adsr: AdsrConfig::default(),
            waveform: Waveform::Sine,
            fm: FmPatch::default(),
            filter: FilterSettings::default(),
            master_gain: 0.8,
            steal_mode: StealMode::Polite,
        }
    }
}

impl EngineSettings {
    /// Default settings for `variant`.
    pub fn for_variant(variant: EngineVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    fn shared_stage(&self) -> SharedStage {
        SharedStage {
            filter_enabled: self.variant == EngineVariant::Subtractive,
            filter_type: self.filter.filter_type,
            cutoff: self.filter.cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF),
            resonance: self.filter.resonance.clamp(MIN_RESONANCE, MAX_RESONANCE),
            master_gain: self.master_gain.clamp(0.0, 1.0),
        }
    }
}

/// Polyphonic synthesizer driving a [`RenderSink`].
pub struct SynthEngine<S: RenderSink + ?Sized = AudioContext> {
    sink: Arc<S>,
    lane: LaneId,
    pool: VoicePool,
    variant: EngineVariant,
    adsr: AdsrConfig,
    waveform: Waveform,
    fm: FmPatch,
    filter: FilterSettings,
    master_gain: f32,
}

impl<S: RenderSink + ?Sized> fmt::Debug for SynthEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthEngine")
            .field("lane", &self.lane)
            .field("variant", &self.variant)
            .field("capacity", &self.pool.capacity())
            .field("adsr", &self.adsr)
            .field("patch", &self.patch())
            .field("filter", &self.filter)
            .field("master_gain", &self.master_gain)
            .finish_non_exhaustive()
    }
}

impl<S: RenderSink + ?Sized> SynthEngine<S> {
    /// Build an engine on `sink`.
    ///
    /// Opens a render lane of its own with the configured shared stage;
    /// other engines on the same sink are untouched. Fails if the sink is
    /// closed or the capacity is zero.
    pub fn new(sink: Arc<S>, settings: EngineSettings) -> Result<Self> {
        if !sink.is_open() {
            return Err(EngineError::ContextClosed);
        }
        if settings.capacity == 0 {
            return Err(EngineError::invalid("voice capacity must be at least 1"));
        }
        if !settings.master_gain.is_finite()
            || !settings.filter.cutoff.is_finite()
            || !settings.filter.resonance.is_finite()
        {
            return Err(EngineError::invalid("engine settings must be finite"));
        }

        let stage = settings.shared_stage();
        let lane = sink.open_lane();
        sink.submit(RenderCommand::OpenLane {
            lane,
            capacity: settings.capacity,
            stage,
        });

        let mut pool = VoicePool::in_lane(lane, settings.capacity);
        pool.set_steal_mode(settings.steal_mode);

        tracing::info!(
            %lane,
            variant = %settings.variant,
            capacity = settings.capacity,
            sample_rate = sink.sample_rate(),
            "synth engine ready"
        );

        Ok(Self {
            sink,
            lane,
            pool,
            variant: settings.variant,
            adsr: settings.adsr,
            waveform: settings.waveform,
            fm: settings.fm,
            filter: FilterSettings {
                cutoff: stage.cutoff,
                resonance: stage.resonance,
                ..settings.filter
            },
            master_gain: stage.master_gain,
        })
    }

    /// Start a note.
    ///
    /// Non-finite or non-positive frequencies are ignored. Velocity is
    /// clamped to `[0, 1]`; NaN counts as full velocity.
    pub fn note_on(&mut self, frequency: f32, velocity: f32) -> Option<NoteOnOutcome> {
        if !frequency.is_finite() || frequency <= 0.0 {
            tracing::warn!(frequency, "ignoring note on with invalid frequency");
            return None;
        }
        let velocity = if velocity.is_nan() {
            1.0
        } else {
            velocity.clamp(0.0, 1.0)
        };

        let now = self.sink.now();
        let settings = self.voice_settings();
        let outcome = self.pool.note_on(
            Trigger::new(frequency, velocity, now),
            &settings,
            &*self.sink,
        );
        tracing::debug!(frequency, velocity, ?outcome, "note on");
        Some(outcome)
    }

    /// Release the note at `frequency`. Unknown pitches are ignored.
    pub fn note_off(&mut self, frequency: f32) -> Option<VoiceId> {
        let now = self.sink.now();
        let voice = self
            .pool
            .note_off(frequency, now, self.adsr.release(), &*self.sink);
        if voice.is_some() {
            tracing::debug!(frequency, "note off");
        }
        voice
    }

    /// Release every sounding note.
    pub fn all_notes_off(&mut self) {
        let now = self.sink.now();
        self.pool.release_all(now, self.adsr.release(), &*self.sink);
    }

    /// Cut every voice immediately, tails included.
    pub fn silence(&mut self) {
        let now = self.sink.now();
        self.pool.hard_silence_all(now, &*self.sink);
    }

    /// Apply a typed parameter change.
    pub fn update_parameter(&mut self, param: EngineParam) -> std::result::Result<(), ParamError> {
        match param {
            EngineParam::Filter(p) => self.update_filter(param.name(), p),
            EngineParam::Envelope(p) => self.update_envelope(param.name(), p),
            EngineParam::Oscillator(OscillatorParam::Waveform(waveform)) => {
                match self.variant {
                    EngineVariant::Subtractive => self.waveform = waveform,
                    EngineVariant::Fm => self.fm.carrier = waveform,
                }
                self.broadcast_patch();
                Ok(())
            }
            EngineParam::Fm(p) => self.update_fm(param.name(), p),
            EngineParam::Mixer(MixerParam::MasterGain(gain)) => {
                let gain = finite(param.name(), gain)?.clamp(0.0, 1.0);
                self.master_gain = gain;
                self.sink.submit(RenderCommand::SetMasterGain {
                    lane: self.lane,
                    gain,
                });
                Ok(())
            }
        }
    }

    /// Parse and apply a named parameter; errors are logged and dropped.
    pub fn apply_raw(&mut self, name: &str, value: impl Into<ParamValue>) {
        let result = EngineParam::parse(name, value).and_then(|p| self.update_parameter(p));
        if let Err(error) = result {
            tracing::warn!(%error, "parameter update ignored");
        }
    }

    /// Read-only handle to recent output samples.
    pub fn analysis_tap(&self) -> AnalysisTap {
        self.sink.analysis_tap()
    }

    /// Voices currently sounding, release tails included.
    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count(self.sink.now())
    }

    /// Apply due teardowns now rather than on the next note on.
    pub fn reap(&mut self) -> usize {
        let now = self.sink.now();
        self.pool.reap(now)
    }

    /// Render lane this engine plays into.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Synthesis method.
    pub fn variant(&self) -> EngineVariant {
        self.variant
    }

    /// Current envelope timing.
    pub fn adsr(&self) -> AdsrConfig {
        self.adsr
    }

    /// Number of voices.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// The voice pool.
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Patch new notes are built from.
    pub fn patch(&self) -> GeneratorPatch {
        match self.variant {
            EngineVariant::Subtractive => GeneratorPatch::Subtractive {
                waveform: self.waveform,
            },
            EngineVariant::Fm => GeneratorPatch::Fm(self.fm),
        }
    }

    /// Shared filter settings.
    pub fn filter(&self) -> FilterSettings {
        self.filter
    }

    /// Output gain target.
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Peak gain of a full-velocity note.
    pub fn headroom(&self) -> f32 {
        1.0 / self.pool.capacity() as f32
    }

    /// The sink commands go to.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            patch: self.patch(),
            adsr: self.adsr,
            headroom: self.headroom(),
        }
    }

    fn broadcast_patch(&mut self) {
        let patch = self.patch();
        self.pool.broadcast_patch(patch, &*self.sink);
    }

    fn update_filter(
        &mut self,
        name: &'static str,
        param: FilterParam,
    ) -> std::result::Result<(), ParamError> {
        if self.variant != EngineVariant::Subtractive {
            return Err(ParamError::NotSupported {
                param: name,
                variant: self.variant.as_str(),
            });
        }
        match param {
            FilterParam::Cutoff(hz) => {
                let hz = finite(name, hz)?.clamp(MIN_CUTOFF, MAX_CUTOFF);
                self.filter.cutoff = hz;
                self.sink.submit(RenderCommand::SetFilterCutoff { lane: self.lane, hz });
            }
            FilterParam::Resonance(q) => {
                let q = finite(name, q)?.clamp(MIN_RESONANCE, MAX_RESONANCE);
                self.filter.resonance = q;
                self.sink.submit(RenderCommand::SetFilterResonance { lane: self.lane, q });
            }
            FilterParam::Type(output) => {
                self.filter.filter_type = output;
                self.sink.submit(RenderCommand::SetFilterType {
                    lane: self.lane,
                    output,
                });
            }
        }
        Ok(())
    }

    fn update_envelope(
        &mut self,
        name: &'static str,
        param: EnvelopeParam,
    ) -> std::result::Result<(), ParamError> {
        match param {
            EnvelopeParam::Attack(s) => self.adsr.set_attack(finite64(name, s)?),
            EnvelopeParam::Decay(s) => self.adsr.set_decay(finite64(name, s)?),
            EnvelopeParam::Sustain(level) => self.adsr.set_sustain(finite(name, level)?),
            EnvelopeParam::Release(s) => self.adsr.set_release(finite64(name, s)?),
        }
        Ok(())
    }

    fn update_fm(&mut self, name: &'static str, param: FmParam) -> std::result::Result<(), ParamError> {
        if self.variant != EngineVariant::Fm {
            return Err(ParamError::NotSupported {
                param: name,
                variant: self.variant.as_str(),
            });
        }
        match param {
            FmParam::ModulationIndex(index) => self.fm.index = finite(name, index)?.max(0.0),
            FmParam::FrequencyRatio(ratio) => {
                let ratio = finite(name, ratio)?;
                if ratio <= 0.0 {
                    return Err(ParamError::InvalidValue {
                        param: name.to_owned(),
                        value: ratio.to_string(),
                    });
                }
                self.fm.ratio = ratio;
            }
            FmParam::CarrierWaveform(waveform) => self.fm.carrier = waveform,
            FmParam::ModulatorWaveform(waveform) => self.fm.modulator = waveform,
        }
        self.broadcast_patch();
        Ok(())
    }
}

impl<S: RenderSink + ?Sized> Drop for SynthEngine<S> {
    fn drop(&mut self) {
        if self.sink.is_open() {
            let now = self.sink.now();
            self.pool.hard_silence_all(now, &*self.sink);
            self.sink.submit(RenderCommand::CloseLane { lane: self.lane });
        }
    }
}

fn finite(name: &str, value: f32) -> std::result::Result<f32, ParamError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamError::InvalidValue {
            param: name.to_owned(),
            value: value.to_string(),
        })
    }
}

fn finite64(name: &str, value: f64) -> std::result::Result<f64, ParamError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamError::InvalidValue {
            param: name.to_owned(),
            value: value.to_string(),
        })
    }
}
