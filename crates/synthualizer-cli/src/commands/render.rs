//! Offline rendering to a WAV file.

use super::common::{EngineArgs, default_tail};
use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use synthualizer_io::{DEFAULT_BLOCK_SIZE, WavSpec, render_offline, write_wav};
use synthualizer_synth::{AudioContext, SynthEngine};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Seconds to hold the notes before releasing them
    #[arg(long, default_value_t = 1.0)]
    pub hold: f64,

    /// Seconds to render after release (defaults to the release time plus 0.1)
    #[arg(long)]
    pub tail: Option<f64>,

    /// Sample rate override
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Frames per render block
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = args.engine.engine_config()?;
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    let settings = config.to_engine_settings()?;
    let notes = args.engine.frequencies()?;
    let hold = args.hold.max(0.0);
    let tail = args.tail.unwrap_or_else(|| default_tail(&config)).max(0.0);

    let (context, mut renderer) = AudioContext::new(config.context_config().without_lookahead())?;
    let mut engine: SynthEngine = SynthEngine::new(Arc::clone(&context), settings)?;

    println!(
        "Rendering {} note(s) with '{}' to {}",
        notes.len(),
        config.name,
        args.output.display()
    );

    let total_frames = ((hold + tail) * f64::from(config.sample_rate)).round() as u64;
    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    for &freq in &notes {
        engine.note_on(freq, 1.0);
    }
    let mut samples = render_offline(&mut renderer, hold, args.block_size, |done, _| {
        pb.set_position(done as u64);
    });
    let held = samples.len() as u64;

    engine.all_notes_off();
    let tail_samples = render_offline(&mut renderer, tail, args.block_size, |done, _| {
        pb.set_position(held + done as u64);
    });
    samples.extend_from_slice(&tail_samples);
    pb.finish_with_message("done");

    engine.reap();
    tracing::debug!(
        active = engine.active_voice_count(),
        queued = context.queued_commands(),
        "render finished"
    );

    write_wav(&args.output, &samples, WavSpec::mono(config.sample_rate))
        .with_context(|| format!("writing {}", args.output.display()))?;

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    println!(
        "Wrote {} frames ({:.2}s at {} Hz), peak {:.3}",
        samples.len(),
        samples.len() as f64 / f64::from(config.sample_rate),
        config.sample_rate,
        peak
    );
    Ok(())
}

