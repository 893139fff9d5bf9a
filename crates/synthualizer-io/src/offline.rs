//! Rendering without a device.
//!
//! The caller interleaves control and rendering on one thread: schedule
//! notes on an engine, render a stretch, schedule more, render again. The
//! context clock only moves while the renderer runs, so with a context built
//! from [`ContextConfig::without_lookahead`](synthualizer_synth::ContextConfig::without_lookahead)
//! note times line up with the rendered frames exactly.

use synthualizer_synth::Renderer;

/// Frames per block when the caller has no preference.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Render `seconds` of audio in blocks of `block_size` frames.
///
/// `on_block` receives the frames rendered so far and the total, after
/// every block.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use synthualizer_io::{DEFAULT_BLOCK_SIZE, render_offline};
/// use synthualizer_synth::{AudioContext, ContextConfig, EngineSettings, SynthEngine};
///
/// let (context, mut renderer) =
///     AudioContext::new(ContextConfig::default().without_lookahead()).unwrap();
/// let mut engine: SynthEngine = SynthEngine::new(Arc::clone(&context), EngineSettings::default()).unwrap();
///
/// engine.note_on(220.0, 1.0);
/// let mut samples = render_offline(&mut renderer, 0.5, DEFAULT_BLOCK_SIZE, |_, _| {});
/// engine.note_off(220.0);
/// samples.extend(render_offline(&mut renderer, 0.5, DEFAULT_BLOCK_SIZE, |_, _| {}));
///
/// assert_eq!(samples.len(), 48000);
/// ```
pub fn render_offline(
    renderer: &mut Renderer,
    seconds: f64,
    block_size: usize,
    mut on_block: impl FnMut(usize, usize),
) -> Vec<f32> {
    let total = frames_for(seconds, renderer.sample_rate());
    let block_size = block_size.max(1);

    let mut samples = vec![0.0; total];
    let mut done = 0;
    for block in samples.chunks_mut(block_size) {
        renderer.process(block);
        done += block.len();
        on_block(done, total);
    }

    tracing::debug!(frames = total, seconds, "offline render finished");
    samples
}

fn frames_for(seconds: f64, sample_rate: f32) -> usize {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * f64::from(sample_rate)).round() as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthualizer_synth::{AudioContext, ContextConfig};

    #[test]
    fn frame_count_follows_sample_rate() {
        assert_eq!(frames_for(1.0, 48000.0), 48000);
        assert_eq!(frames_for(0.25, 44100.0), 11025);
        assert_eq!(frames_for(-1.0, 48000.0), 0);
        assert_eq!(frames_for(f64::NAN, 48000.0), 0);
    }

    #[test]
    fn progress_reaches_total() {
        let (_context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
        let mut calls = Vec::new();
        let samples = render_offline(&mut renderer, 0.01, 128, |done, total| {
            calls.push((done, total));
        });

        assert_eq!(samples.len(), 480);
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.last(), Some(&(480, 480)));
        assert_eq!(renderer.frame(), 480);
    }

    #[test]
    fn silent_without_notes() {
        let (_context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
        let samples = render_offline(&mut renderer, 0.05, 0, |_, _| {});
        assert!(samples.iter().all(|&s| s == 0.0));
    }
}
