//! Render thread: commands in, samples out.
//!
//! The control thread never touches audio state directly. It describes what
//! should happen as timestamped [`RenderCommand`]s and the [`Renderer`]
//! applies them at the start of each block. Timestamps are converted to
//! sample frames, so a note scheduled for time `t` starts on exactly the
//! frame the clock maps `t` to, regardless of block size.
//!
//! ## Lanes
//!
//! Every engine attached to a context renders into its own lane: its voice
//! slots plus its own shared stage. Commands name the lane they address, so
//! two engines on one context never see each other's voices, generations or
//! filter settings. Lane outputs are summed before the analysis tap.
//!
//! ## Generators and tails
//!
//! Each voice slot can hold several generators at once: the current note
//! plus the release tails of notes stolen from it. Every generator carries its
//! own gain curve, so scheduling a fresh attack for the new note never
//! touches the tail that is still fading out. A generator is dropped once its
//! stop frame has passed. When a slot fills up, its quietest generator is
//! faded out over [`EVICT_FADE_MS`] rather than cut mid-waveform.
//!
//! ## Shared stage
//!
//! After mixing, a lane's signal passes through its state-variable filter
//! (subtractive only) and master gain. Cutoff, resonance and master gain
//! move along 50 ms linear ramps to avoid zipper noise.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use synthualizer_core::{
    Automatable, AutomationCurve, AutomationOp, LinearSmoothedParam, SampleClock,
    StateVariableFilter, SvfOutput,
};

use crate::generator::{Generator, GeneratorPatch};
use crate::tap::TapWriter;
use crate::voice::VoiceId;

/// Ramp length for shared-stage parameter changes.
pub const SHARED_RAMP_MS: f32 = 50.0;

/// Generators kept per voice slot before the quietest one is faded out.
pub const MAX_GENERATORS_PER_VOICE: usize = 8;

/// Fade applied to a generator evicted from a full slot.
pub const EVICT_FADE_MS: f64 = 5.0;

/// Gain below which an evicted generator is dropped without a fade.
const SILENT: f32 = 1e-4;

/// Renderer-side address of one engine's voices and shared stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub u32);

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane{}", self.0)
    }
}

/// Snapshot of a lane's shared processing stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedStage {
    /// Whether the filter is in the signal path.
    pub filter_enabled: bool,
    /// Filter response.
    pub filter_type: SvfOutput,
    /// Filter cutoff in Hz.
    pub cutoff: f32,
    /// Filter resonance (Q).
    pub resonance: f32,
    /// Output gain.
    pub master_gain: f32,
}

impl Default for SharedStage {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            filter_type: SvfOutput::Lowpass,
            cutoff: 2000.0,
            resonance: 1.0,
            master_gain: 0.8,
        }
    }
}

/// A message from the control thread to the renderer.
///
/// Commands for a lane that is not open are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Create a generator for `voice` that starts sounding at `at`.
    StartGenerator {
        /// Owning lane.
        lane: LaneId,
        /// Voice slot.
        voice: VoiceId,
        /// Generation the generator belongs to.
        generation: u64,
        /// What to build.
        patch: GeneratorPatch,
        /// Note frequency in Hz.
        frequency: f32,
        /// Start time in seconds.
        at: f64,
    },
    /// Stop a generator at `at`. Unknown or already stopped generators are ignored.
    StopGenerator {
        /// Owning lane.
        lane: LaneId,
        /// Voice slot.
        voice: VoiceId,
        /// Generation to stop.
        generation: u64,
        /// Stop time in seconds.
        at: f64,
    },
    /// Apply an automation op to a generator's gain curve.
    Automate {
        /// Owning lane.
        lane: LaneId,
        /// Voice slot.
        voice: VoiceId,
        /// Generation whose gain is automated.
        generation: u64,
        /// The op.
        op: AutomationOp,
    },
    /// Switch every generator in a slot to a new patch.
    UpdatePatch {
        /// Owning lane.
        lane: LaneId,
        /// Voice slot.
        voice: VoiceId,
        /// The new patch.
        patch: GeneratorPatch,
    },
    /// Ramp the filter cutoff to a new value.
    SetFilterCutoff {
        /// Target lane.
        lane: LaneId,
        /// Cutoff in Hz.
        hz: f32,
    },
    /// Ramp the filter resonance to a new value.
    SetFilterResonance {
        /// Target lane.
        lane: LaneId,
        /// Resonance (Q).
        q: f32,
    },
    /// Switch the filter response.
    SetFilterType {
        /// Target lane.
        lane: LaneId,
        /// New response.
        output: SvfOutput,
    },
    /// Ramp the master gain to a new value.
    SetMasterGain {
        /// Target lane.
        lane: LaneId,
        /// New gain.
        gain: f32,
    },
    /// Create (or reset) a lane with `capacity` empty voice slots.
    OpenLane {
        /// Lane to open.
        lane: LaneId,
        /// Number of voice slots.
        capacity: usize,
        /// Initial shared stage, applied without smoothing.
        stage: SharedStage,
    },
    /// Drop a lane and every generator in it.
    CloseLane {
        /// Lane to close.
        lane: LaneId,
    },
}

#[derive(Debug)]
struct ActiveGenerator {
    generation: u64,
    generator: Generator,
    gain: AutomationCurve,
    start_frame: u64,
    stop_frame: Option<u64>,
}

impl ActiveGenerator {
    fn finished_by(&self, frame: u64) -> bool {
        self.stop_frame.is_some_and(|stop| stop <= frame)
    }
}

#[derive(Debug, Default)]
struct VoiceSlot {
    generators: Vec<ActiveGenerator>,
}

impl VoiceSlot {
    fn find(&mut self, generation: u64) -> Option<&mut ActiveGenerator> {
        self.generators
            .iter_mut()
            .find(|g| g.generation == generation)
    }

    /// Make room in a full slot by fading out its quietest generator.
    ///
    /// Generators already due to stop within the fade are left alone.
    fn evict_quietest(&mut self, clock: &SampleClock, frame: u64) {
        let time = clock.time_of_frame(frame);
        let fade_end = time + EVICT_FADE_MS / 1000.0;
        let fade_frame = clock.frame_at(fade_end);

        let quietest = self
            .generators
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.finished_by(fade_frame))
            .map(|(i, g)| (i, g.gain.value_at(time).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((index, level)) = quietest else {
            return;
        };

        if level < SILENT {
            self.generators.remove(index);
            return;
        }
        let victim = &mut self.generators[index];
        victim.gain.apply(AutomationOp::CancelFrom { time });
        victim.gain.apply(AutomationOp::SetValue { value: level, time });
        victim.gain.apply(AutomationOp::LinearRamp {
            value: 0.0,
            end_time: fade_end,
        });
        victim.stop_frame = Some(victim.stop_frame.map_or(fade_frame, |s| s.min(fade_frame)));
        tracing::trace!(generation = victim.generation, level, "generator evicted with fade");
    }
}

#[derive(Debug)]
struct Lane {
    id: LaneId,
    slots: Vec<VoiceSlot>,
    filter: StateVariableFilter,
    filter_type: SvfOutput,
    filter_enabled: bool,
    cutoff: LinearSmoothedParam,
    resonance: LinearSmoothedParam,
    master: LinearSmoothedParam,
}

impl Lane {
    fn new(id: LaneId, capacity: usize, stage: SharedStage, sample_rate: f32) -> Self {
        let smoothed = |value| LinearSmoothedParam::with_config(value, sample_rate, SHARED_RAMP_MS);
        let mut lane = Self {
            id,
            slots: Vec::new(),
            filter: StateVariableFilter::new(sample_rate),
            filter_type: stage.filter_type,
            filter_enabled: stage.filter_enabled,
            cutoff: smoothed(stage.cutoff),
            resonance: smoothed(stage.resonance),
            master: smoothed(stage.master_gain),
        };
        lane.slots.resize_with(capacity, VoiceSlot::default);
        lane.configure(stage);
        lane
    }

    fn configure(&mut self, stage: SharedStage) {
        self.filter_enabled = stage.filter_enabled;
        self.filter_type = stage.filter_type;
        self.filter.set_output(stage.filter_type);
        self.filter.reset();
        self.cutoff.set_immediate(stage.cutoff);
        self.resonance.set_immediate(stage.resonance);
        self.master.set_immediate(stage.master_gain);
        self.filter.set_cutoff(stage.cutoff);
        self.filter.set_resonance(stage.resonance);
    }

    fn stage(&self) -> SharedStage {
        SharedStage {
            filter_enabled: self.filter_enabled,
            filter_type: self.filter_type,
            cutoff: self.cutoff.get(),
            resonance: self.resonance.get(),
            master_gain: self.master.get(),
        }
    }

    fn generator_count(&self) -> usize {
        self.slots.iter().map(|s| s.generators.len()).sum()
    }

    #[inline]
    fn render_frame(&mut self, frame: u64, time: f64) -> f32 {
        let mut mix = 0.0;
        for slot in &mut self.slots {
            for active in &mut slot.generators {
                if frame < active.start_frame || active.finished_by(frame) {
                    continue;
                }
                mix += active.generator.next_sample() * active.gain.value_at(time);
            }
        }

        let cutoff = self.cutoff.advance();
        let resonance = self.resonance.advance();
        let filtered = if self.filter_enabled {
            self.filter.set_cutoff(cutoff);
            self.filter.set_resonance(resonance);
            self.filter.process(mix)
        } else {
            mix
        };
        filtered * self.master.advance()
    }

    fn finish_block(&mut self, frame: u64, time: f64) {
        for slot in &mut self.slots {
            slot.generators.retain(|g| !g.finished_by(frame));
            for active in &mut slot.generators {
                active.gain.prune_before(time);
            }
        }
    }
}

/// Owns all render-side state and produces audio.
///
/// Created together with its [`AudioContext`](crate::AudioContext) and moved
/// into whatever drives the audio device (or an offline loop).
pub struct Renderer {
    sample_rate: f32,
    clock: Arc<SampleClock>,
    commands: Receiver<RenderCommand>,
    lanes: Vec<Lane>,
    tap: TapWriter,
    frame: u64,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("sample_rate", &self.sample_rate)
            .field("frame", &self.frame)
            .field("lanes", &self.lanes.len())
            .field("generators", &self.generator_count())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    pub(crate) fn new(
        sample_rate: f32,
        clock: Arc<SampleClock>,
        commands: Receiver<RenderCommand>,
        tap: TapWriter,
    ) -> Self {
        Self {
            sample_rate,
            frame: clock.frames(),
            clock,
            commands,
            lanes: Vec::new(),
            tap,
        }
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Number of open lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Generators currently alive across every lane.
    pub fn generator_count(&self) -> usize {
        self.lanes.iter().map(Lane::generator_count).sum()
    }

    /// Generators alive in one lane, or zero if it is not open.
    pub fn lane_generator_count(&self, lane: LaneId) -> usize {
        self.lane(lane).map_or(0, Lane::generator_count)
    }

    /// Generators alive in one voice slot.
    pub fn voice_generator_count(&self, lane: LaneId, voice: VoiceId) -> usize {
        self.lane(lane)
            .and_then(|l| l.slots.get(voice))
            .map_or(0, |s| s.generators.len())
    }

    /// Current shared stage of a lane, with smoothed values where they are mid-ramp.
    pub fn stage(&self, lane: LaneId) -> Option<SharedStage> {
        self.lane(lane).map(Lane::stage)
    }

    /// Render a mono block.
    pub fn process(&mut self, out: &mut [f32]) {
        self.drain_commands();
        for sample in out.iter_mut() {
            *sample = self.render_frame();
        }
        self.finish_block(out.len() as u64);
    }

    /// Render an interleaved block, copying the mono mix to every channel.
    pub fn process_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        self.drain_commands();
        let mut frames = 0;
        for frame in out.chunks_mut(channels) {
            let sample = self.render_frame();
            frame.fill(sample);
            frames += 1;
        }
        self.finish_block(frames);
    }

    fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    fn lane_mut(&mut self, id: LaneId) -> Option<&mut Lane> {
        self.lanes.iter_mut().find(|l| l.id == id)
    }

    fn slot_mut(&mut self, lane: LaneId, voice: VoiceId) -> Option<&mut VoiceSlot> {
        self.lane_mut(lane).and_then(|l| l.slots.get_mut(voice))
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::StartGenerator {
                lane,
                voice,
                generation,
                patch,
                frequency,
                at,
            } => {
                let start_frame = self.clock.frame_at(at);
                let generator = Generator::new(patch, frequency, self.sample_rate);
                let (clock, now) = (&self.clock, self.frame);
                let slot = self
                    .lanes
                    .iter_mut()
                    .find(|l| l.id == lane)
                    .and_then(|l| l.slots.get_mut(voice));
                if let Some(slot) = slot {
                    if slot.generators.len() >= MAX_GENERATORS_PER_VOICE {
                        slot.evict_quietest(clock, now);
                    }
                    slot.generators.push(ActiveGenerator {
                        generation,
                        generator,
                        gain: AutomationCurve::new(0.0),
                        start_frame,
                        stop_frame: None,
                    });
                }
            }
            RenderCommand::StopGenerator {
                lane,
                voice,
                generation,
                at,
            } => {
                let stop = self.clock.frame_at(at);
                if let Some(active) = self.slot_mut(lane, voice).and_then(|s| s.find(generation)) {
                    active.stop_frame = Some(active.stop_frame.map_or(stop, |s| s.min(stop)));
                }
            }
            RenderCommand::Automate {
                lane,
                voice,
                generation,
                op,
            } => {
                if let Some(active) = self.slot_mut(lane, voice).and_then(|s| s.find(generation)) {
                    active.gain.apply(op);
                }
            }
            RenderCommand::UpdatePatch { lane, voice, patch } => {
                if let Some(slot) = self.slot_mut(lane, voice) {
                    for active in &mut slot.generators {
                        active.generator.set_patch(patch);
                    }
                }
            }
            RenderCommand::SetFilterCutoff { lane, hz } => {
                if let Some(lane) = self.lane_mut(lane) {
                    lane.cutoff.set_target(hz);
                }
            }
            RenderCommand::SetFilterResonance { lane, q } => {
                if let Some(lane) = self.lane_mut(lane) {
                    lane.resonance.set_target(q);
                }
            }
            RenderCommand::SetFilterType { lane, output } => {
                if let Some(lane) = self.lane_mut(lane) {
                    lane.filter_type = output;
                    lane.filter.set_output(output);
                }
            }
            RenderCommand::SetMasterGain { lane, gain } => {
                if let Some(lane) = self.lane_mut(lane) {
                    lane.master.set_target(gain);
                }
            }
            RenderCommand::OpenLane {
                lane,
                capacity,
                stage,
            } => {
                let fresh = Lane::new(lane, capacity, stage, self.sample_rate);
                match self.lane_mut(lane) {
                    Some(existing) => *existing = fresh,
                    None => self.lanes.push(fresh),
                }
                tracing::debug!(%lane, capacity, "render lane opened");
            }
            RenderCommand::CloseLane { lane } => {
                self.lanes.retain(|l| l.id != lane);
                tracing::debug!(%lane, "render lane closed");
            }
        }
    }

    #[inline]
    fn render_frame(&mut self) -> f32 {
        let frame = self.frame;
        let time = frame as f64 / f64::from(self.sample_rate);

        let out: f32 = self
            .lanes
            .iter_mut()
            .map(|lane| lane.render_frame(frame, time))
            .sum();
        self.tap.push(out);
        self.frame += 1;
        out
    }

    fn finish_block(&mut self, frames: u64) {
        let frame = self.frame;
        let time = frame as f64 / f64::from(self.sample_rate);
        for lane in &mut self.lanes {
            lane.finish_block(frame, time);
        }
        self.clock.advance(frames);
    }
}
