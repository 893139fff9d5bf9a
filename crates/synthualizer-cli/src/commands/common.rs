//! Options shared by `play` and `render`.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use synthualizer_config::{EngineConfig, load_preset};
use synthualizer_synth::pitch::note_to_freq;

/// Which engine setup to use and which notes to hold.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Preset name or path (factory presets: init, pluck, pad, fm-bell)
    #[arg(short, long, conflicts_with = "config")]
    pub preset: Option<String>,

    /// Engine configuration TOML file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Notes to hold, as names (C3, F#2) or frequencies in Hz
    #[arg(short, long, value_delimiter = ',', default_value = "C3,E3,G3")]
    pub notes: Vec<String>,
}

impl EngineArgs {
    /// The configuration selected by `--preset` or `--config`, or the defaults.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        if let Some(path) = &self.config {
            return EngineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()));
        }
        if let Some(name) = &self.preset {
            return load_preset(name).with_context(|| format!("loading preset '{name}'"));
        }
        Ok(EngineConfig::default())
    }

    /// Note frequencies in Hz.
    pub fn frequencies(&self) -> anyhow::Result<Vec<f32>> {
        self.notes.iter().map(String::as_str).map(parse_pitch).collect()
    }
}

/// Parse a note name or a frequency in Hz.
pub fn parse_pitch(text: &str) -> anyhow::Result<f32> {
    let text = text.trim();
    if let Some(freq) = note_to_freq(text) {
        return Ok(freq);
    }
    match text.parse::<f32>() {
        Ok(freq) if freq.is_finite() && freq > 0.0 => Ok(freq),
        _ => anyhow::bail!("invalid note '{text}' (expected a name like C3 or a frequency in Hz)"),
    }
}

/// Seconds to keep rendering after release so tails finish.
pub fn default_tail(config: &EngineConfig) -> f64 {
    config.envelope.release + 0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(notes: &[&str]) -> EngineArgs {
        EngineArgs {
            preset: None,
            config: None,
            notes: notes.iter().map(|n| (*n).to_string()).collect(),
        }
    }

    #[test]
    fn pitches_from_names_and_numbers() {
        assert!((parse_pitch("A4").unwrap() - 440.0).abs() < 1e-3);
        assert!((parse_pitch(" C2 ").unwrap() - 65.41).abs() < 0.01);
        assert_eq!(parse_pitch("311.5").unwrap(), 311.5);
        assert!(parse_pitch("H2").is_err());
        assert!(parse_pitch("-40").is_err());
    }

    #[test]
    fn frequencies_fail_on_any_bad_note() {
        assert_eq!(args(&["A4", "220"]).frequencies().unwrap().len(), 2);
        assert!(args(&["A4", "nope"]).frequencies().is_err());
    }

    #[test]
    fn defaults_without_preset() {
        let config = args(&[]).engine_config().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!((default_tail(&config) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let mut engine = args(&[]);
        engine.preset = Some("no-such-preset-12345".into());
        let err = engine.engine_config().unwrap_err();
        assert!(format!("{err:#}").contains("no preset named"));
    }
}
