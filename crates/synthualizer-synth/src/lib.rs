//! Synthualizer Synth - polyphonic voice allocation and envelope scheduling
//!
//! This crate is the sound engine behind the synthualizer playground. A
//! keyboard (or any other collaborator) sends note and parameter requests to
//! a [`SynthEngine`]; the engine allocates voices, schedules their gain
//! envelopes against a shared clock and ships the result to a [`Renderer`]
//! running on the audio thread.
//!
//! # Core Components
//!
//! ## Control side
//!
//! - [`SynthEngine`] - Note on/off, parameters, analysis tap, voice count
//! - [`VoicePool`] - Fixed voice collection, pitch index and stealing policy
//! - [`Voice`] - One note slot with generation-tagged generators
//! - [`envelope`] - ADSR scheduling onto any [`Automatable`](synthualizer_core::Automatable)
//! - [`EngineParam`] - Typed parameters, parsed from names at the string boundary
//!
//! ## Render side
//!
//! - [`Renderer`] - Applies commands sample-accurately and mixes each engine's lane
//! - [`Generator`] - Per-note sound source (subtractive or FM)
//! - [`Oscillator`] - PolyBLEP oscillator
//! - [`AnalysisTap`] - Lock-free window onto the latest output
//!
//! ## Plumbing
//!
//! - [`AudioContext`] - Clock, command queue, tap and lanes; process-wide shared instance
//! - [`RenderSink`] - What an engine sends commands to
//! - [`CommandLog`] - Recording sink for tests
//!
//! # Example
//!
//! ```rust
//! use synthualizer_synth::{AudioContext, ContextConfig, EngineSettings, SynthEngine};
//!
//! let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
//! let mut engine: SynthEngine = SynthEngine::new(context, EngineSettings::default()).unwrap();
//!
//! engine.note_on(261.63, 0.8);
//! engine.apply_raw("waveform", "sawtooth");
//!
//! let mut block = vec![0.0; 4800];
//! renderer.process(&mut block);
//! assert!(block.iter().any(|s| s.abs() > 0.0));
//! ```

pub mod context;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod generator;
pub mod oscillator;
pub mod params;
pub mod pitch;
pub mod pool;
pub mod render;
pub mod tap;
pub mod teardown;
pub mod voice;

pub use context::{AudioContext, CommandLog, ContextConfig, DEFAULT_COMMAND_CAPACITY, RenderSink};
pub use engine::{EngineSettings, EngineVariant, FilterSettings, ParseVariantError, SynthEngine};
pub use envelope::{AdsrConfig, EnvelopeStage, EnvelopeTimeline};
pub use error::EngineError;
pub use generator::{FmPatch, Generator, GeneratorPatch};
pub use oscillator::{Oscillator, ParseWaveformError, Waveform};
pub use params::{
    EngineParam, EnvelopeParam, FilterParam, FmParam, MixerParam, OscillatorParam, ParamError,
    ParamValue,
};
pub use pool::{
    DEFAULT_CAPACITY, NoteKey, NoteOnOutcome, ParseStealModeError, StealMode, VoicePool,
};
pub use render::{LaneId, RenderCommand, Renderer, SharedStage};
pub use tap::{AnalysisTap, DEFAULT_TAP_SIZE};
pub use teardown::{Teardown, TeardownScheduler};
pub use voice::{Release, Trigger, Voice, VoiceId, VoiceSettings};

pub use synthualizer_core::SvfOutput;
