//! Realtime playback on an audio device.

use super::common::{EngineArgs, default_tail};
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use synthualizer_io::{OutputConfig, start_output, stop_output};
use synthualizer_synth::SynthEngine;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Args, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output device (index, exact name, or partial name)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Seconds to hold the notes before releasing them
    #[arg(long, default_value_t = 1.0)]
    pub hold: f64,

    /// Total playback time in seconds (defaults to hold plus the release tail)
    #[arg(long)]
    pub duration: Option<f64>,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let config = args.engine.engine_config()?;
    let settings = config.to_engine_settings()?;
    let notes = args.engine.frequencies()?;
    let duration = args
        .duration
        .unwrap_or(args.hold + default_tail(&config))
        .max(0.0);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let output = OutputConfig::new(config.context_config(), args.device.clone());
    let context = start_output(&output).context("starting audio output")?;
    let mut engine: SynthEngine = SynthEngine::new(context, settings)?;

    println!(
        "Playing {} note(s) with '{}' ({}, {} voices). Press Ctrl+C to stop.",
        notes.len(),
        config.name,
        engine.variant(),
        engine.capacity()
    );

    for &freq in &notes {
        engine.note_on(freq, 1.0);
    }

    let started = Instant::now();
    let hold = Duration::from_secs_f64(args.hold.max(0.0));
    let total = Duration::from_secs_f64(duration);
    let mut released = false;
    while running.load(Ordering::SeqCst) && started.elapsed() < total {
        if !released && started.elapsed() >= hold {
            engine.all_notes_off();
            released = true;
            tracing::debug!(elapsed = ?started.elapsed(), "notes released");
        }
        engine.reap();
        std::thread::sleep(POLL_INTERVAL);
    }

    if !running.load(Ordering::SeqCst) {
        println!("\nStopping...");
    }
    drop(engine);
    stop_output();
    println!("Done!");
    Ok(())
}
