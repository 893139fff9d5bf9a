//! A single voice: one note slot in the pool.
//!
//! A [`Voice`] is permanent; the generator it drives is not. Every
//! allocation bumps the voice's generation and asks the renderer for a brand
//! new generator tagged with that generation. Release schedules the
//! generator's stop for the end of the tail, and the voice stays busy until a
//! teardown for the same generation is applied.
//!
//! The voice keeps a control-side mirror of its current generator's gain
//! curve. Every envelope op is applied to the mirror and forwarded to the
//! renderer through [`VoiceGain`], so the control thread can read the exact
//! value the listener hears at any instant without asking the audio thread.

use synthualizer_core::{Automatable, AutomationCurve, AutomationOp};

use crate::context::RenderSink;
use crate::envelope::{self, AdsrConfig, EnvelopeStage, EnvelopeTimeline};
use crate::generator::GeneratorPatch;
use crate::render::{LaneId, RenderCommand};

/// Index of a voice within its pool (0..capacity).
pub type VoiceId = usize;

/// A note request: what to play, how hard, and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    /// Pitch in Hz.
    pub frequency: f32,
    /// Velocity in `[0, 1]`.
    pub velocity: f32,
    /// Clock time in seconds.
    pub time: f64,
}

impl Trigger {
    /// Create a trigger.
    pub fn new(frequency: f32, velocity: f32, time: f64) -> Self {
        Self {
            frequency,
            velocity,
            time,
        }
    }
}

/// Engine-wide settings a voice needs when it (re)allocates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    /// Generator to build.
    pub patch: GeneratorPatch,
    /// Envelope timing.
    pub adsr: AdsrConfig,
    /// Peak gain at full velocity.
    pub headroom: f32,
}

/// Outcome of releasing a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    /// Gain the release ramp starts from.
    pub start_value: f32,
    /// Time the tail ends and the generator stops.
    pub ends_at: f64,
    /// Generation that was released.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GeneratorState {
    patch: GeneratorPatch,
    stop_at: Option<f64>,
}

/// Gain control for one voice generation.
///
/// Applies ops to the voice's mirror curve and forwards them to the
/// renderer, keeping both copies identical.
pub struct VoiceGain<'a, S: RenderSink + ?Sized> {
    lane: LaneId,
    voice: VoiceId,
    generation: u64,
    curve: &'a mut AutomationCurve,
    sink: &'a S,
}

impl<S: RenderSink + ?Sized> Automatable for VoiceGain<'_, S> {
    fn apply(&mut self, op: AutomationOp) {
        self.curve.apply(op);
        self.sink.submit(RenderCommand::Automate {
            lane: self.lane,
            voice: self.voice,
            generation: self.generation,
            op,
        });
    }

    fn value_at(&self, time: f64) -> f32 {
        self.curve.value_at(time)
    }
}

/// One note slot.
#[derive(Debug, Clone)]
pub struct Voice {
    lane: LaneId,
    id: VoiceId,
    active: bool,
    frequency: Option<f32>,
    velocity: f32,
    start_time: f64,
    generation: u64,
    gain: AutomationCurve,
    envelope: Option<EnvelopeTimeline>,
    generator: Option<GeneratorState>,
}

impl Voice {
    /// Create an idle voice in the default lane.
    pub fn new(id: VoiceId) -> Self {
        Self::in_lane(LaneId::default(), id)
    }

    /// Create an idle voice whose commands address `lane`.
    pub fn in_lane(lane: LaneId, id: VoiceId) -> Self {
        Self {
            lane,
            id,
            active: false,
            frequency: None,
            velocity: 0.0,
            start_time: 0.0,
            generation: 0,
            gain: AutomationCurve::new(0.0),
            envelope: None,
            generator: None,
        }
    }

    /// Pool index.
    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// Render lane this voice plays into.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// `true` from allocation until the release tail has been torn down.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Assigned pitch, `None` once released or stolen.
    pub fn frequency(&self) -> Option<f32> {
        self.frequency
    }

    /// Velocity of the current note.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Clock time of the last (re-)trigger.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Generation counter, bumped on every allocation and hard silence.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mirror of the current generation's gain curve.
    pub fn gain(&self) -> &AutomationCurve {
        &self.gain
    }

    /// Envelope timeline of the current note.
    pub fn envelope(&self) -> Option<&EnvelopeTimeline> {
        self.envelope.as_ref()
    }

    /// Envelope stage at `time`.
    pub fn envelope_stage(&self, time: f64) -> EnvelopeStage {
        if !self.active {
            return EnvelopeStage::Idle;
        }
        self.envelope
            .map_or(EnvelopeStage::Idle, |env| env.stage_at(time))
    }

    /// Patch of the live generator, if any.
    pub fn patch(&self) -> Option<GeneratorPatch> {
        self.generator.map(|g| g.patch)
    }

    /// When the generator is scheduled to stop, if released.
    pub fn stop_time(&self) -> Option<f64> {
        self.generator.and_then(|g| g.stop_at)
    }

    /// `true` while a release tail is pending.
    pub fn is_releasing(&self) -> bool {
        self.active && self.stop_time().is_some()
    }

    /// `true` if the voice still occupies its slot at `time`.
    ///
    /// Differs from [`is_active`](Self::is_active) only in the window between
    /// a tail ending and its teardown being applied.
    pub fn is_busy_at(&self, time: f64) -> bool {
        self.active && self.stop_time().is_none_or(|stop| stop > time)
    }

    /// Build a fresh generator and schedule attack and decay.
    pub fn allocate<S: RenderSink + ?Sized>(
        &mut self,
        trigger: Trigger,
        settings: &VoiceSettings,
        sink: &S,
    ) {
        self.generation += 1;
        self.active = true;
        self.frequency = Some(trigger.frequency);
        self.velocity = trigger.velocity;
        self.start_time = trigger.time;
        self.gain.reset(0.0);
        self.envelope = Some(EnvelopeTimeline::triggered(trigger.time, &settings.adsr));
        self.generator = Some(GeneratorState {
            patch: settings.patch,
            stop_at: None,
        });

        sink.submit(RenderCommand::StartGenerator {
            lane: self.lane,
            voice: self.id,
            generation: self.generation,
            patch: settings.patch,
            frequency: trigger.frequency,
            at: trigger.time,
        });

        let peak = trigger.velocity * settings.headroom;
        let sustain = peak * settings.adsr.sustain();
        envelope::schedule_attack_decay(
            &mut self.gain_control(sink),
            trigger.time,
            peak,
            sustain,
            settings.adsr.attack(),
            settings.adsr.decay(),
        );

        tracing::trace!(
            voice = self.id,
            generation = self.generation,
            frequency = trigger.frequency,
            "voice allocated"
        );
    }

    /// Re-articulate in place: discard the generator and start over.
    pub fn retrigger<S: RenderSink + ?Sized>(
        &mut self,
        trigger: Trigger,
        settings: &VoiceSettings,
        sink: &S,
    ) {
        self.hard_silence(trigger.time, sink);
        self.allocate(trigger, settings, sink);
    }

    /// Start the release tail.
    ///
    /// The ramp starts from the gain at `now`, whatever phase the envelope is
    /// in. Returns `None` if there is nothing to release.
    pub fn release<S: RenderSink + ?Sized>(
        &mut self,
        now: f64,
        release: f64,
        sink: &S,
    ) -> Option<Release> {
        if !self.active || self.is_releasing() {
            return None;
        }
        let release = release.max(0.0);
        let start_value = envelope::schedule_release(&mut self.gain_control(sink), now, release);

        let ends_at = now + release;
        if let Some(generator) = self.generator.as_mut() {
            generator.stop_at = Some(ends_at);
        }
        if let Some(env) = self.envelope.as_mut() {
            env.release(now, release);
        }
        self.frequency = None;

        sink.submit(RenderCommand::StopGenerator {
            lane: self.lane,
            voice: self.id,
            generation: self.generation,
            at: ends_at,
        });

        Some(Release {
            start_value,
            ends_at,
            generation: self.generation,
        })
    }

    /// Stop the generator now, without a tail.
    ///
    /// Bumps the generation, so teardowns already scheduled go stale.
    pub fn hard_silence<S: RenderSink + ?Sized>(&mut self, now: f64, sink: &S) {
        if self.generator.take().is_some() {
            // A pending stop for this generation may still arrive later;
            // the renderer keeps whichever stop comes first.
            sink.submit(RenderCommand::StopGenerator {
                lane: self.lane,
                voice: self.id,
                generation: self.generation,
                at: now,
            });
        }
        self.generation += 1;
        self.gain.reset(0.0);
        self.active = false;
        self.frequency = None;
        self.envelope = None;
    }

    /// Switch the live generator to `patch` without retriggering.
    pub fn update_patch<S: RenderSink + ?Sized>(&mut self, patch: GeneratorPatch, sink: &S) {
        if let Some(generator) = self.generator.as_mut() {
            generator.patch = patch;
            sink.submit(RenderCommand::UpdatePatch {
                lane: self.lane,
                voice: self.id,
                patch,
            });
        }
    }

    /// Apply a teardown for `generation`.
    ///
    /// Returns `false` if the voice has moved on to a newer generation (or
    /// was already silenced), in which case nothing changes.
    pub fn finish(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.active {
            return false;
        }
        self.active = false;
        self.frequency = None;
        self.generator = None;
        self.envelope = None;
        true
    }

    fn gain_control<'a, S: RenderSink + ?Sized>(&'a mut self, sink: &'a S) -> VoiceGain<'a, S> {
        VoiceGain {
            lane: self.lane,
            voice: self.id,
            generation: self.generation,
            curve: &mut self.gain,
            sink,
        }
    }
}
