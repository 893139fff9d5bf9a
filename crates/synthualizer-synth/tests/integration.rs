//! Integration tests for synthualizer-synth.
//!
//! Tests cover allocation and stealing through the engine surface, envelope
//! shape as scheduled on voices, parameter rebroadcast, the full
//! control-to-render path through an `AudioContext`, and several engines
//! sharing one context.

use std::sync::Arc;

use synthualizer_core::Automatable;
use synthualizer_synth::pitch::note_to_freq;
use synthualizer_synth::{
    AdsrConfig, AudioContext, CommandLog, ContextConfig, EngineParam, EngineSettings,
    EngineVariant, EnvelopeStage, GeneratorPatch, LaneId, NoteOnOutcome, OscillatorParam,
    RenderCommand, RenderSink, Renderer, StealMode, SynthEngine, Waveform,
};

const SR: f32 = 48000.0;

fn logged_engine(settings: EngineSettings) -> (SynthEngine<CommandLog>, Arc<CommandLog>) {
    let sink = Arc::new(CommandLog::new(SR));
    let engine = SynthEngine::new(Arc::clone(&sink), settings).expect("engine builds");
    sink.take();
    (engine, sink)
}

fn with_adsr(capacity: usize) -> EngineSettings {
    EngineSettings {
        capacity,
        adsr: AdsrConfig::new(0.1, 0.1, 0.5, 0.3),
        ..EngineSettings::default()
    }
}

fn note(name: &str) -> f32 {
    note_to_freq(name).expect("valid note name")
}

// ---------------------------------------------------------------------------
// 1. Allocation, retrigger and stealing
// ---------------------------------------------------------------------------

#[test]
fn retrigger_same_pitch_reuses_voice() {
    let (mut engine, sink) = logged_engine(with_adsr(6));
    let first = engine.note_on(440.0, 1.0);
    sink.advance(0.05);
    let second = engine.note_on(440.0, 1.0);

    assert_eq!(first, Some(NoteOnOutcome::Allocated { voice: 0 }));
    assert_eq!(second, Some(NoteOnOutcome::Retriggered { voice: 0 }));
    assert_eq!(engine.active_voice_count(), 1, "occupancy unchanged");
    assert_eq!(engine.pool().indexed_len(), 1);
}

#[test]
fn stealing_selects_oldest_voice() {
    let (mut engine, sink) = logged_engine(with_adsr(2));
    engine.note_on(100.0, 1.0);
    sink.advance(0.1);
    engine.note_on(200.0, 1.0);
    sink.advance(0.1);

    let voice_100 = engine.pool().voice_for(100.0).expect("100 Hz indexed");
    let voice_200 = engine.pool().voice_for(200.0).expect("200 Hz indexed");
    let untouched = engine.pool().voice(voice_200).map(|v| v.start_time());

    engine.note_on(300.0, 1.0);

    assert_eq!(engine.pool().voice_for(300.0), Some(voice_100));
    assert_eq!(engine.pool().voice_for(100.0), None);
    assert_eq!(engine.pool().voice_for(200.0), Some(voice_200));
    assert_eq!(
        engine.pool().voice(voice_200).map(|v| v.start_time()),
        untouched,
        "200 Hz voice not retriggered"
    );
}

#[test]
fn steal_evicts_before_inserting() {
    let (mut engine, sink) = logged_engine(with_adsr(1));
    engine.note_on(100.0, 1.0);
    sink.advance(0.2);
    sink.take();

    let outcome = engine.note_on(200.0, 1.0);
    assert_eq!(
        outcome,
        Some(NoteOnOutcome::Stole {
            voice: 0,
            evicted: Some(100.0)
        })
    );

    // Exactly one pitch per voice, and the index agrees with the voice
    assert_eq!(engine.pool().indexed_len(), 1);
    assert_eq!(engine.pool().voice(0).and_then(|v| v.frequency()), Some(200.0));

    // The old note gets its release before the new generator starts
    let commands = sink.take();
    let stop = commands
        .iter()
        .position(|c| matches!(c, RenderCommand::StopGenerator { generation: 1, .. }))
        .expect("old generator stopped");
    let start = commands
        .iter()
        .position(|c| matches!(c, RenderCommand::StartGenerator { generation: 2, .. }))
        .expect("new generator started");
    assert!(stop < start);
}

#[test]
fn hard_steal_mode_cuts_tail() {
    let settings = EngineSettings {
        steal_mode: StealMode::Hard,
        ..with_adsr(1)
    };
    let (mut engine, sink) = logged_engine(settings);
    engine.note_on(100.0, 1.0);
    sink.set_time(0.5);
    sink.take();

    engine.note_on(200.0, 1.0);
    assert_eq!(
        sink.take()[0],
        RenderCommand::StopGenerator {
            lane: engine.lane(),
            voice: 0,
            generation: 1,
            at: 0.5
        }
    );
}

#[test]
fn note_off_unknown_pitch_is_noop() {
    let (mut engine, sink) = logged_engine(with_adsr(4));
    engine.note_on(100.0, 1.0);
    sink.take();
    assert_eq!(engine.note_off(555.0), None);
    assert!(sink.is_empty());
    assert_eq!(engine.active_voice_count(), 1);
}

#[test]
fn release_tail_counts_as_active() {
    let (mut engine, sink) = logged_engine(with_adsr(4));
    engine.note_on(100.0, 1.0);
    sink.set_time(1.0);
    engine.note_off(100.0);

    sink.set_time(1.2);
    assert_eq!(engine.active_voice_count(), 1);
    assert_eq!(
        engine.pool().voice(0).map(|v| v.envelope_stage(1.2)),
        Some(EnvelopeStage::Release)
    );

    sink.set_time(1.31);
    assert_eq!(engine.active_voice_count(), 0);
    assert_eq!(engine.reap(), 1);
}

// ---------------------------------------------------------------------------
// 2. Envelope shape
// ---------------------------------------------------------------------------

#[test]
fn envelope_rises_then_settles_on_sustain() {
    let (mut engine, _sink) = logged_engine(with_adsr(6));
    engine.note_on(440.0, 1.0);

    let peak = engine.headroom();
    let gain = engine.pool().voice(0).expect("voice 0").gain();
    assert!(gain.value_at(0.05) < gain.value_at(0.1));
    assert!((gain.value_at(0.1) - peak).abs() < 1e-6);
    assert!((gain.value_at(0.2) - peak * 0.5).abs() < 1e-6);
}

#[test]
fn release_mid_attack_starts_from_current_value() {
    let (mut engine, sink) = logged_engine(with_adsr(6));
    engine.note_on(440.0, 1.0);

    sink.set_time(0.05);
    let before = engine.pool().voice(0).expect("voice 0").gain().value_at(0.05);
    engine.note_off(440.0);

    let gain = engine.pool().voice(0).expect("voice 0").gain();
    assert!((gain.value_at(0.05) - before).abs() < 1e-7);
    assert!(before < engine.headroom(), "released before peak");
    assert!(gain.value_at(0.2) < before, "falling");
}

#[test]
fn velocity_scales_peak() {
    let (mut engine, _sink) = logged_engine(with_adsr(4));
    engine.note_on(440.0, 0.5);
    let gain = engine.pool().voice(0).expect("voice 0").gain();
    assert!((gain.value_at(0.1) - 0.125).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// 3. Parameter rebroadcast
// ---------------------------------------------------------------------------

#[test]
fn waveform_change_reaches_every_voice_and_future_notes() {
    let (mut engine, sink) = logged_engine(with_adsr(6));
    for f in [100.0, 200.0, 300.0] {
        engine.note_on(f, 1.0);
    }
    sink.take();

    let square = GeneratorPatch::Subtractive {
        waveform: Waveform::Square,
    };
    engine
        .update_parameter(EngineParam::Oscillator(OscillatorParam::Waveform(
            Waveform::Square,
        )))
        .expect("waveform accepted");

    let updated: Vec<usize> = sink
        .take()
        .iter()
        .filter_map(|c| match c {
            RenderCommand::UpdatePatch { voice, patch, .. } if *patch == square => Some(*voice),
            _ => None,
        })
        .collect();
    assert_eq!(updated, vec![0, 1, 2]);

    engine.note_on(400.0, 1.0);
    assert!(sink.take().iter().any(|c| matches!(
        c,
        RenderCommand::StartGenerator { voice: 3, patch, .. } if *patch == square
    )));
    assert_eq!(engine.pool().voice(3).and_then(|v| v.patch()), Some(square));
}

#[test]
fn raw_parameter_boundary() {
    let (mut engine, _sink) = logged_engine(with_adsr(6));
    engine.apply_raw("release", 1.5);
    engine.apply_raw("sustain", 2.0);
    engine.apply_raw("filterType", "bandpass");
    engine.apply_raw("nonsense", 1.0);

    assert_eq!(engine.adsr().release(), 1.5);
    assert_eq!(engine.adsr().sustain(), 1.0, "sustain clamped");
    assert_eq!(engine.filter().filter_type.as_str(), "bandpass");
}

// ---------------------------------------------------------------------------
// 4. End-to-end scenario
// ---------------------------------------------------------------------------

#[test]
fn six_voice_keyboard_session() {
    let (mut engine, sink) = logged_engine(EngineSettings::default());
    let held = ["C2", "D2", "E2", "F2", "G2", "A2"];

    for (i, name) in held.iter().enumerate() {
        sink.set_time(i as f64 * 0.1);
        engine.note_on(note(name), 1.0);
    }
    assert_eq!(engine.active_voice_count(), 6);
    assert_eq!(engine.pool().indexed_len(), 6);

    let c2_voice = engine.pool().voice_for(note("C2")).expect("C2 indexed");
    sink.set_time(0.6);
    let outcome = engine.note_on(note("B2"), 1.0);
    assert_eq!(
        outcome,
        Some(NoteOnOutcome::Stole {
            voice: c2_voice,
            evicted: Some(note("C2"))
        })
    );
    assert_eq!(engine.active_voice_count(), 6);

    // Release B2 and press it again straight away: every voice is busy
    // (five held, one in its tail), so the oldest held note gives way.
    sink.set_time(1.0);
    engine.note_off(note("B2"));
    let d2_voice = engine.pool().voice_for(note("D2")).expect("D2 indexed");
    let outcome = engine.note_on(note("B2"), 1.0).expect("valid note");
    assert_eq!(outcome.voice(), d2_voice);
    assert!(engine.active_voice_count() <= engine.capacity());

    let gain = engine.pool().voice(d2_voice).expect("voice").gain();
    assert_eq!(gain.value_at(1.0), 0.0, "fresh attack from zero");
    assert!(gain.value_at(1.005) > 0.0);

    // Once the tail has finished, that voice is the free one
    sink.set_time(2.0);
    engine.note_off(note("B2"));
    sink.set_time(3.0);
    let outcome = engine.note_on(note("B2"), 1.0);
    assert!(matches!(outcome, Some(NoteOnOutcome::Allocated { .. })));
}

// ---------------------------------------------------------------------------
// 5. Through the renderer
// ---------------------------------------------------------------------------

fn render_frames(renderer: &mut Renderer, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames];
    for block in out.chunks_mut(256) {
        renderer.process(block);
    }
    out
}

fn render_seconds(renderer: &mut Renderer, seconds: f32) -> Vec<f32> {
    render_frames(renderer, (seconds * SR) as usize)
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
}

#[test]
fn notes_sound_and_fall_silent() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine = SynthEngine::new(context, with_adsr(6)).unwrap();

    engine.note_on(220.0, 1.0);
    let held = render_seconds(&mut renderer, 0.3);
    let level = peak(&held);
    assert!(level > 0.01, "audible while held, peak {level}");
    assert_eq!(engine.active_voice_count(), 1);

    engine.note_off(220.0);
    render_seconds(&mut renderer, 0.5);
    assert_eq!(engine.active_voice_count(), 0);
    assert_eq!(renderer.generator_count(), 0);

    let tail = render_seconds(&mut renderer, 0.1);
    assert!(tail.iter().all(|s| s.abs() < 1e-4), "silent after release");
}

#[test]
fn stolen_note_tail_keeps_playing() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine = SynthEngine::new(context, with_adsr(1)).unwrap();

    engine.note_on(110.0, 1.0);
    render_seconds(&mut renderer, 0.25);
    engine.note_on(330.0, 1.0);
    render_seconds(&mut renderer, 0.01);
    let lane = engine.lane();
    assert_eq!(renderer.voice_generator_count(lane, 0), 2, "tail plus new note");

    render_seconds(&mut renderer, 0.4);
    assert_eq!(renderer.voice_generator_count(lane, 0), 1, "tail finished");
}

#[test]
fn fm_engine_bypasses_filter() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine =
        SynthEngine::new(context, EngineSettings::for_variant(EngineVariant::Fm)).unwrap();
    engine.note_on(440.0, 1.0);
    let out = render_seconds(&mut renderer, 0.05);

    assert_eq!(renderer.stage(engine.lane()).map(|s| s.filter_enabled), Some(false));
    assert!(out.iter().any(|s| s.abs() > 0.0));
}

#[test]
fn cutoff_ramp_reaches_target_after_50ms() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine = SynthEngine::new(context, EngineSettings::default()).unwrap();
    render_seconds(&mut renderer, 0.01);

    let lane = engine.lane();
    let cutoff = |renderer: &Renderer| renderer.stage(lane).map_or(f32::NAN, |s| s.cutoff);
    engine.apply_raw("cutoff", 500.0);
    render_seconds(&mut renderer, 0.02);
    let midway = cutoff(&renderer);
    assert!(midway < 2000.0 && midway > 500.0, "still ramping: {midway}");

    render_seconds(&mut renderer, 0.05);
    assert_eq!(cutoff(&renderer), 500.0);
}

#[test]
fn analysis_tap_sees_output() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine =
        SynthEngine::new(Arc::clone(&context), EngineSettings::default()).unwrap();
    let tap = engine.analysis_tap();

    engine.note_on(440.0, 1.0);
    let out = render_seconds(&mut renderer, 0.1);

    let mut window = vec![0.0; 512];
    assert_eq!(tap.snapshot(&mut window), 512);
    assert_eq!(&window[..], &out[out.len() - 512..]);
    assert_eq!(context.analysis_tap().samples_written(), out.len() as u64);
}

#[test]
fn closed_context_refuses_new_engine() {
    let (context, _renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    context.close();
    let result: Result<SynthEngine, _> = SynthEngine::new(context, EngineSettings::default());
    assert!(result.is_err());
}

#[test]
fn shared_context_is_reused_until_released() {
    let first = AudioContext::acquire(ContextConfig::default(), |renderer| {
        Ok(Box::new(renderer) as Box<dyn std::any::Any + Send>)
    })
    .unwrap();
    let second = AudioContext::acquire(ContextConfig::default(), |_| {
        panic!("should not start a second driver")
    })
    .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.has_driver());

    AudioContext::release_shared();
    assert!(first.is_closed());
    assert!(AudioContext::shared().is_none());
    assert!(!first.is_open());
}

#[test]
fn note_between_blocks_lands_on_next_unrendered_block() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut engine: SynthEngine = SynthEngine::new(Arc::clone(&context), with_adsr(6)).unwrap();
    render_frames(&mut renderer, 256);

    engine.note_on(220.0, 1.0);
    let start = engine.pool().voice(0).map(|v| v.start_time());
    assert_eq!(start, Some(512.0 / f64::from(SR)));

    // The block in flight when the note arrived stays silent...
    let in_flight = render_frames(&mut renderer, 256);
    assert!(in_flight.iter().all(|&s| s == 0.0));
    // ...and the next one starts the attack from zero, none of it skipped
    let attack = render_frames(&mut renderer, 256);
    assert_eq!(attack[0], 0.0);
    assert!(peak(&attack) > 0.0);
}

// ---------------------------------------------------------------------------
// 6. Several engines on one context
// ---------------------------------------------------------------------------

#[test]
fn subtractive_and_fm_engines_share_a_context() {
    let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    let mut sub: SynthEngine = SynthEngine::new(Arc::clone(&context), with_adsr(6)).unwrap();
    sub.note_on(220.0, 1.0);
    render_seconds(&mut renderer, 0.05);
    assert_eq!(renderer.lane_generator_count(sub.lane()), 1);

    let fm_settings = EngineSettings {
        adsr: AdsrConfig::new(0.01, 0.1, 0.5, 0.3),
        ..EngineSettings::for_variant(EngineVariant::Fm)
    };
    let mut fm: SynthEngine = SynthEngine::new(Arc::clone(&context), fm_settings).unwrap();
    assert_ne!(sub.lane(), fm.lane());
    let out = render_seconds(&mut renderer, 0.05);

    // The first engine's note and filter survive the second engine's arrival
    assert_eq!(renderer.lane_count(), 2);
    assert_eq!(renderer.lane_generator_count(sub.lane()), 1);
    assert_eq!(renderer.stage(sub.lane()).map(|s| s.filter_enabled), Some(true));
    assert_eq!(renderer.stage(fm.lane()).map(|s| s.filter_enabled), Some(false));
    assert!(peak(&out) > 0.01, "subtractive note still audible");
    assert_eq!(sub.active_voice_count(), 1);

    // Same pitch on both: each lands on voice 0 of its own lane
    let outcome = fm.note_on(220.0, 1.0);
    assert_eq!(outcome, Some(NoteOnOutcome::Allocated { voice: 0 }));
    render_seconds(&mut renderer, 0.05);
    assert_eq!(renderer.voice_generator_count(sub.lane(), 0), 1);
    assert_eq!(renderer.voice_generator_count(fm.lane(), 0), 1);

    // Releasing the subtractive note leaves the FM note sounding
    sub.note_off(220.0);
    let later = render_seconds(&mut renderer, 0.5);
    assert_eq!(sub.active_voice_count(), 0);
    assert_eq!(renderer.lane_generator_count(sub.lane()), 0);
    assert_eq!(fm.active_voice_count(), 1);
    assert_eq!(renderer.lane_generator_count(fm.lane()), 1);
    assert!(peak(&later[later.len() - 4800..]) > 0.001, "FM note still audible");

    // Filter changes stay in their lane
    sub.apply_raw("cutoff", 400.0);
    render_seconds(&mut renderer, 0.1);
    assert_eq!(renderer.stage(sub.lane()).map(|s| s.cutoff), Some(400.0));
    assert_eq!(
        renderer.stage(fm.lane()).map(|s| s.cutoff),
        Some(EngineSettings::default().filter.cutoff)
    );

    // Dropping an engine closes only its lane
    let fm_lane = fm.lane();
    drop(fm);
    render_frames(&mut renderer, 256);
    assert_eq!(renderer.lane_count(), 1);
    assert_eq!(renderer.stage(fm_lane), None);
    assert!(renderer.stage(sub.lane()).is_some());
}

#[test]
fn engines_on_a_command_log_address_separate_lanes() {
    let sink = Arc::new(CommandLog::new(SR));
    let mut first = SynthEngine::new(Arc::clone(&sink), with_adsr(2)).unwrap();
    let mut second = SynthEngine::new(Arc::clone(&sink), with_adsr(2)).unwrap();
    assert_eq!((first.lane(), second.lane()), (LaneId(0), LaneId(1)));
    sink.take();

    first.note_on(100.0, 1.0);
    second.note_on(100.0, 1.0);
    for command in sink.take() {
        if let RenderCommand::StartGenerator { lane, voice, generation, .. } = command {
            assert_eq!((voice, generation), (0, 1));
            assert!(lane == first.lane() || lane == second.lane());
        }
    }
    assert_eq!(first.active_voice_count(), 1);
    assert_eq!(second.active_voice_count(), 1);
}
