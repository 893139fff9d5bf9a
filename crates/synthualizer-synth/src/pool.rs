//! Fixed-size voice pool with note index and stealing.
//!
//! The pool owns every [`Voice`] and an index from sounding pitch to the
//! voice playing it. A note-on resolves in this order:
//!
//! 1. The pitch is already indexed: retrigger that voice in place.
//! 2. A voice is free: allocate the lowest-id one.
//! 3. Otherwise steal the voice with the earliest start time (lowest id on a
//!    tie). Its old pitch leaves the index before the new one goes in, so a
//!    voice is never indexed under two pitches.
//!
//! ## Index invariant
//!
//! A voice's `frequency` is `Some(f)` exactly when the index maps `f` to it.
//! Every path that clears a voice's frequency (release, steal, hard silence)
//! removes the index entry first.
//!
//! ## Teardown
//!
//! Released voices stay busy until their tail ends. The pool keeps a
//! [`TeardownScheduler`] and applies due entries in [`reap`](VoicePool::reap),
//! which every note-on calls first.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::context::RenderSink;
use crate::generator::GeneratorPatch;
use crate::render::LaneId;
use crate::teardown::TeardownScheduler;
use crate::voice::{Trigger, Voice, VoiceId, VoiceSettings};

/// Default number of voices.
pub const DEFAULT_CAPACITY: usize = 6;

/// What happens to a voice that is stolen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StealMode {
    /// Release the stolen note with its full release ramp.
    #[default]
    Polite,
    /// Cut the stolen note immediately.
    Hard,
}

impl StealMode {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Polite => "polite",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for StealMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized steal mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown steal mode '{0}' (expected polite or hard)")]
pub struct ParseStealModeError(pub String);

impl FromStr for StealMode {
    type Err = ParseStealModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polite" | "release" => Ok(Self::Polite),
            "hard" | "cut" => Ok(Self::Hard),
            _ => Err(ParseStealModeError(s.to_owned())),
        }
    }
}

/// Index key for a pitch.
///
/// Pitches are compared by exact bit pattern, which is what a keyboard
/// sending the same frequency for the same key produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteKey(u32);

impl NoteKey {
    /// Key for `frequency`.
    pub fn new(frequency: f32) -> Self {
        // Fold -0.0 into 0.0 so both spell the same key
        Self((frequency + 0.0).to_bits())
    }

    /// The pitch this key stands for.
    pub fn frequency(self) -> f32 {
        f32::from_bits(self.0)
    }
}

/// How a note-on was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteOnOutcome {
    /// The pitch was already sounding and its voice restarted.
    Retriggered {
        /// Voice that restarted.
        voice: VoiceId,
    },
    /// A free voice took the note.
    Allocated {
        /// Voice that took the note.
        voice: VoiceId,
    },
    /// The oldest voice was taken from another note.
    Stole {
        /// Voice that took the note.
        voice: VoiceId,
        /// Pitch that lost its voice, if it was still indexed.
        evicted: Option<f32>,
    },
}

impl NoteOnOutcome {
    /// Voice now playing the note.
    pub fn voice(&self) -> VoiceId {
        match *self {
            Self::Retriggered { voice } | Self::Allocated { voice } | Self::Stole { voice, .. } => {
                voice
            }
        }
    }
}

/// Fixed collection of voices plus the pitch index.
///
/// # Example
///
/// ```rust
/// use synthualizer_synth::{CommandLog, GeneratorPatch, AdsrConfig, Trigger, VoicePool, VoiceSettings};
///
/// let sink = CommandLog::new(48000.0);
/// let mut pool = VoicePool::new(2);
/// let settings = VoiceSettings {
///     patch: GeneratorPatch::default(),
///     adsr: AdsrConfig::default(),
///     headroom: 0.5,
/// };
///
/// pool.note_on(Trigger::new(100.0, 1.0, 0.0), &settings, &sink);
/// pool.note_on(Trigger::new(200.0, 1.0, 0.1), &settings, &sink);
/// let outcome = pool.note_on(Trigger::new(300.0, 1.0, 0.2), &settings, &sink);
///
/// // The 100 Hz voice was oldest
/// assert_eq!(outcome.voice(), 0);
/// assert_eq!(pool.voice_for(100.0), None);
/// ```
#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Vec<Voice>,
    index: HashMap<NoteKey, VoiceId>,
    teardowns: TeardownScheduler,
    steal_mode: StealMode,
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl VoicePool {
    /// Create a pool of `capacity` idle voices (at least one) in the default lane.
    pub fn new(capacity: usize) -> Self {
        Self::in_lane(LaneId::default(), capacity)
    }

    /// Create a pool whose voices play into `lane`.
    pub fn in_lane(lane: LaneId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            voices: (0..capacity).map(|id| Voice::in_lane(lane, id)).collect(),
            index: HashMap::with_capacity(capacity),
            teardowns: TeardownScheduler::new(),
            steal_mode: StealMode::default(),
        }
    }

    /// Set how stolen voices are silenced.
    pub fn set_steal_mode(&mut self, mode: StealMode) {
        self.steal_mode = mode;
    }

    /// Current steal mode.
    pub fn steal_mode(&self) -> StealMode {
        self.steal_mode
    }

    /// Number of voices.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Render lane the voices play into.
    pub fn lane(&self) -> LaneId {
        self.voices.first().map_or_else(LaneId::default, Voice::lane)
    }

    /// All voices, by id.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// One voice.
    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    /// Voice currently indexed under `frequency`.
    pub fn voice_for(&self, frequency: f32) -> Option<VoiceId> {
        self.index.get(&NoteKey::new(frequency)).copied()
    }

    /// Number of indexed pitches.
    pub fn indexed_len(&self) -> usize {
        self.index.len()
    }

    /// Indexed pitches, in no particular order.
    pub fn indexed_frequencies(&self) -> impl Iterator<Item = f32> + '_ {
        self.index.keys().map(|k| k.frequency())
    }

    /// Teardowns not yet applied.
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.len()
    }

    /// Voices still busy at `now`, release tails included.
    ///
    /// Equivalent to reaping first and counting active voices, without
    /// mutating the pool.
    pub fn active_count(&self, now: f64) -> usize {
        self.voices.iter().filter(|v| v.is_busy_at(now)).count()
    }

    /// Apply every teardown due at `now`. Returns how many voices went idle.
    pub fn reap(&mut self, now: f64) -> usize {
        let mut finished = 0;
        for teardown in self.teardowns.due(now) {
            let Some(voice) = self.voices.get_mut(teardown.voice) else {
                continue;
            };
            if voice.finish(teardown.generation) {
                finished += 1;
            } else {
                tracing::trace!(
                    voice = teardown.voice,
                    generation = teardown.generation,
                    "stale teardown ignored"
                );
            }
        }
        finished
    }

    /// Start a note.
    pub fn note_on<S: RenderSink + ?Sized>(
        &mut self,
        trigger: Trigger,
        settings: &VoiceSettings,
        sink: &S,
    ) -> NoteOnOutcome {
        self.reap(trigger.time);
        let key = NoteKey::new(trigger.frequency);

        if let Some(&id) = self.index.get(&key) {
            self.voices[id].retrigger(trigger, settings, sink);
            return NoteOnOutcome::Retriggered { voice: id };
        }

        if let Some(id) = self.voices.iter().position(|v| !v.is_active()) {
            self.voices[id].allocate(trigger, settings, sink);
            self.index.insert(key, id);
            return NoteOnOutcome::Allocated { voice: id };
        }

        let id = self.oldest();
        let evicted = self.voices[id].frequency();
        if let Some(old) = evicted {
            self.index.remove(&NoteKey::new(old));
        }

        let victim = &mut self.voices[id];
        match self.steal_mode {
            StealMode::Polite => {
                // The release tail keeps playing on the renderer under the
                // old generation; its teardown goes stale on reallocation.
                victim.release(trigger.time, settings.adsr.release(), sink);
            }
            StealMode::Hard => victim.hard_silence(trigger.time, sink),
        }
        victim.allocate(trigger, settings, sink);
        self.index.insert(key, id);

        tracing::debug!(
            voice = id,
            evicted = ?evicted,
            frequency = trigger.frequency,
            mode = %self.steal_mode,
            "voice stolen"
        );
        NoteOnOutcome::Stole { voice: id, evicted }
    }

    /// Release the note at `frequency`. Unknown pitches are ignored.
    pub fn note_off<S: RenderSink + ?Sized>(
        &mut self,
        frequency: f32,
        now: f64,
        release: f64,
        sink: &S,
    ) -> Option<VoiceId> {
        let id = self.index.remove(&NoteKey::new(frequency))?;
        self.release_voice(id, now, release, sink);
        Some(id)
    }

    /// Release every indexed note.
    pub fn release_all<S: RenderSink + ?Sized>(&mut self, now: f64, release: f64, sink: &S) {
        let ids: Vec<VoiceId> = self.index.drain().map(|(_, id)| id).collect();
        for id in ids {
            self.release_voice(id, now, release, sink);
        }
    }

    /// Cut every voice immediately and forget all pending teardowns.
    pub fn hard_silence_all<S: RenderSink + ?Sized>(&mut self, now: f64, sink: &S) {
        self.index.clear();
        self.teardowns.clear();
        for voice in &mut self.voices {
            if voice.is_active() {
                voice.hard_silence(now, sink);
            }
        }
    }

    /// Switch every live generator to `patch`.
    ///
    /// Voices in their release tail are updated too; they still sound.
    pub fn broadcast_patch<S: RenderSink + ?Sized>(&mut self, patch: GeneratorPatch, sink: &S) {
        for voice in &mut self.voices {
            voice.update_patch(patch, sink);
        }
    }

    fn release_voice<S: RenderSink + ?Sized>(
        &mut self,
        id: VoiceId,
        now: f64,
        release: f64,
        sink: &S,
    ) {
        if let Some(done) = self.voices[id].release(now, release, sink) {
            self.teardowns.schedule(id, done.generation, done.ends_at);
        }
    }

    fn oldest(&self) -> VoiceId {
        self.voices
            .iter()
            .min_by(|a, b| {
                a.start_time()
                    .total_cmp(&b.start_time())
                    .then_with(|| a.id().cmp(&b.id()))
            })
            .map_or(0, Voice::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandLog;
    use crate::envelope::AdsrConfig;
    use crate::render::RenderCommand;

    fn settings(capacity: usize) -> VoiceSettings {
        VoiceSettings {
            patch: GeneratorPatch::default(),
            adsr: AdsrConfig::new(0.1, 0.1, 0.5, 0.3),
            headroom: 1.0 / capacity as f32,
        }
    }

    fn on(pool: &mut VoicePool, log: &CommandLog, freq: f32, time: f64) -> NoteOnOutcome {
        let settings = settings(pool.capacity());
        pool.note_on(Trigger::new(freq, 1.0, time), &settings, log)
    }

    #[test]
    fn test_allocates_lowest_free_id() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(3);
        assert_eq!(on(&mut pool, &log, 100.0, 0.0), NoteOnOutcome::Allocated { voice: 0 });
        assert_eq!(on(&mut pool, &log, 200.0, 0.0), NoteOnOutcome::Allocated { voice: 1 });
        assert_eq!(pool.indexed_len(), 2);
        assert_eq!(pool.active_count(0.0), 2);
    }

    #[test]
    fn test_retrigger_reuses_voice() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(3);
        on(&mut pool, &log, 440.0, 0.0);
        let outcome = on(&mut pool, &log, 440.0, 0.5);
        assert_eq!(outcome, NoteOnOutcome::Retriggered { voice: 0 });
        assert_eq!(pool.active_count(0.5), 1);
        assert_eq!(pool.indexed_len(), 1);
        assert_eq!(pool.voice(0).map(Voice::start_time), Some(0.5));
    }

    #[test]
    fn test_steal_oldest_with_id_tiebreak() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(2);
        on(&mut pool, &log, 100.0, 0.0);
        on(&mut pool, &log, 200.0, 0.0);

        let outcome = on(&mut pool, &log, 300.0, 0.0);
        assert_eq!(
            outcome,
            NoteOnOutcome::Stole {
                voice: 0,
                evicted: Some(100.0)
            }
        );
        assert_eq!(pool.voice_for(100.0), None);
        assert_eq!(pool.voice_for(200.0), Some(1));
        assert_eq!(pool.voice_for(300.0), Some(0));
    }

    #[test]
    fn test_polite_steal_releases_before_allocating() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(1);
        on(&mut pool, &log, 100.0, 0.0);
        log.take();

        on(&mut pool, &log, 200.0, 1.0);
        let commands = log.take();
        let stop = commands
            .iter()
            .position(|c| matches!(c, RenderCommand::StopGenerator { generation: 1, .. }));
        let start = commands
            .iter()
            .position(|c| matches!(c, RenderCommand::StartGenerator { generation: 2, .. }));
        assert!(stop < start, "release precedes reallocation: {commands:?}");
        assert!(matches!(
            commands[stop.unwrap_or(0)],
            RenderCommand::StopGenerator { at, .. } if (at - 1.3).abs() < 1e-9
        ));
    }

    #[test]
    fn test_hard_steal_stops_immediately() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(1);
        pool.set_steal_mode(StealMode::Hard);
        on(&mut pool, &log, 100.0, 0.0);
        log.take();

        on(&mut pool, &log, 200.0, 1.0);
        assert_eq!(
            log.take()[0],
            RenderCommand::StopGenerator {
                lane: LaneId::default(),
                voice: 0,
                generation: 1,
                at: 1.0
            }
        );
    }

    #[test]
    fn test_note_off_keeps_voice_busy_until_teardown() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(2);
        on(&mut pool, &log, 100.0, 0.0);

        assert_eq!(pool.note_off(100.0, 1.0, 0.3, &log), Some(0));
        assert_eq!(pool.indexed_len(), 0);
        assert_eq!(pool.active_count(1.1), 1);
        assert_eq!(pool.reap(1.1), 0);
        assert_eq!(pool.active_count(2.0), 0);
        assert_eq!(pool.reap(2.0), 1);
        assert!(pool.voice(0).is_some_and(|v| !v.is_active()));
    }

    #[test]
    fn test_note_off_unknown_is_noop() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(2);
        assert_eq!(pool.note_off(123.0, 0.0, 0.3, &log), None);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_busy_tail_not_reused_while_free_voice_exists() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(2);
        on(&mut pool, &log, 100.0, 0.0);
        pool.note_off(100.0, 0.5, 0.3, &log);

        // Voice 0 is still in its tail, so voice 1 takes the note
        assert_eq!(on(&mut pool, &log, 200.0, 0.6), NoteOnOutcome::Allocated { voice: 1 });
        // Tail done: voice 0 is free again
        assert_eq!(on(&mut pool, &log, 300.0, 0.9), NoteOnOutcome::Allocated { voice: 0 });
    }

    #[test]
    fn test_stale_teardown_does_not_free_new_note() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(1);
        on(&mut pool, &log, 100.0, 0.0);
        pool.note_off(100.0, 0.5, 0.3, &log);
        // Steals the releasing voice before its teardown is due
        on(&mut pool, &log, 200.0, 0.6);

        assert_eq!(pool.reap(1.0), 0);
        assert_eq!(pool.active_count(1.0), 1);
        assert_eq!(pool.voice_for(200.0), Some(0));
    }

    #[test]
    fn test_release_all_and_hard_silence_all() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::new(3);
        for (i, f) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            on(&mut pool, &log, f, i as f64 * 0.1);
        }
        pool.release_all(1.0, 0.3, &log);
        assert_eq!(pool.indexed_len(), 0);
        assert_eq!(pool.active_count(1.0), 3);
        assert_eq!(pool.pending_teardowns(), 3);

        pool.hard_silence_all(1.1, &log);
        assert_eq!(pool.active_count(1.1), 0);
        assert_eq!(pool.pending_teardowns(), 0);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        assert_eq!(VoicePool::new(0).capacity(), 1);
    }

    #[test]
    fn test_steal_mode_parse() {
        assert_eq!("HARD".parse::<StealMode>(), Ok(StealMode::Hard));
        assert_eq!("polite".parse::<StealMode>(), Ok(StealMode::Polite));
        assert_eq!(" cut ".parse::<StealMode>(), Ok(StealMode::Hard));
        assert_eq!(StealMode::Hard.to_string(), "hard");

        let err = "gentle".parse::<StealMode>().unwrap_err();
        assert_eq!(err, ParseStealModeError("gentle".into()));
        assert_eq!(
            err.to_string(),
            "unknown steal mode 'gentle' (expected polite or hard)"
        );
    }

    #[test]
    fn test_pool_voices_address_its_lane() {
        let log = CommandLog::new(48000.0);
        let mut pool = VoicePool::in_lane(LaneId(3), 2);
        assert_eq!(pool.lane(), LaneId(3));
        on(&mut pool, &log, 100.0, 0.0);
        pool.note_off(100.0, 0.5, 0.3, &log);

        let commands = log.take();
        assert!(!commands.is_empty());
        assert!(commands.iter().all(|c| matches!(
            c,
            RenderCommand::StartGenerator { lane: LaneId(3), .. }
                | RenderCommand::Automate { lane: LaneId(3), .. }
                | RenderCommand::StopGenerator { lane: LaneId(3), .. }
        )));
    }
}
