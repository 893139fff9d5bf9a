//! Engine configuration file format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use synthualizer_synth::{
    AdsrConfig, ContextConfig, EngineSettings, FilterSettings, FmPatch,
};

use crate::error::ConfigError;
use crate::validation::{parse_name, validate_config};

/// A complete engine setup: variant, polyphony, envelope and tone.
///
/// Stored as TOML. Every section is optional and falls back to the
/// engine defaults, so a preset only needs to name what it changes.
///
/// # TOML Format
///
/// ```toml
/// name = "Init"
/// variant = "subtractive"
/// polyphony = 6
/// sample_rate = 48000
/// master_gain = 0.8
/// steal_mode = "polite"
///
/// [envelope]
/// attack = 0.01
/// decay = 0.1
/// sustain = 0.7
/// release = 0.3
///
/// [oscillator]
/// waveform = "sine"
///
/// [filter]
/// type = "lowpass"
/// cutoff = 2000.0
/// resonance = 1.0
///
/// [fm]
/// carrier_waveform = "sine"
/// modulator_waveform = "sine"
/// ratio = 2.0
/// index = 1.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the configuration.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `subtractive` or `fm`.
    pub variant: String,

    /// Number of voices.
    pub polyphony: usize,

    /// Sample rate hint for the audio context.
    pub sample_rate: u32,

    /// Output gain after the shared filter.
    pub master_gain: f32,

    /// `polite` (release the stolen note) or `hard` (cut it).
    pub steal_mode: String,

    /// ADSR times in seconds, sustain as a fraction of peak.
    pub envelope: EnvelopeSection,

    /// Subtractive oscillator.
    pub oscillator: OscillatorSection,

    /// Shared filter, used by the subtractive variant.
    pub filter: FilterSection,

    /// FM operator settings.
    pub fm: FmSection,
}

/// `[envelope]` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvelopeSection {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level, 0 to 1.
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f64,
}

/// `[oscillator]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OscillatorSection {
    /// `sine`, `square`, `sawtooth` or `triangle`.
    pub waveform: String,
}

/// `[filter]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterSection {
    /// `lowpass`, `highpass`, `bandpass` or `notch`.
    #[serde(rename = "type")]
    pub filter_type: String,
    /// Cutoff in Hz.
    pub cutoff: f32,
    /// Resonance (Q).
    pub resonance: f32,
}

/// `[fm]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FmSection {
    /// Carrier waveform.
    pub carrier_waveform: String,
    /// Modulator waveform.
    pub modulator_waveform: String,
    /// Modulator frequency as a multiple of the note.
    pub ratio: f32,
    /// Modulation depth.
    pub index: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings("Init", &EngineSettings::default())
    }
}

impl Default for EnvelopeSection {
    fn default() -> Self {
        Self::from(AdsrConfig::default())
    }
}

impl From<AdsrConfig> for EnvelopeSection {
    fn from(adsr: AdsrConfig) -> Self {
        Self {
            attack: adsr.attack(),
            decay: adsr.decay(),
            sustain: adsr.sustain(),
            release: adsr.release(),
        }
    }
}

impl Default for OscillatorSection {
    fn default() -> Self {
        Self {
            waveform: EngineSettings::default().waveform.as_str().to_string(),
        }
    }
}

impl Default for FilterSection {
    fn default() -> Self {
        Self::from(FilterSettings::default())
    }
}

impl From<FilterSettings> for FilterSection {
    fn from(filter: FilterSettings) -> Self {
        Self {
            filter_type: filter.filter_type.as_str().to_string(),
            cutoff: filter.cutoff,
            resonance: filter.resonance,
        }
    }
}

impl Default for FmSection {
    fn default() -> Self {
        Self::from(FmPatch::default())
    }
}

impl From<FmPatch> for FmSection {
    fn from(fm: FmPatch) -> Self {
        Self {
            carrier_waveform: fm.carrier.as_str().to_string(),
            modulator_waveform: fm.modulator.as_str().to_string(),
            ratio: fm.ratio,
            index: fm.index,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with engine defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Describe existing engine settings.
    pub fn from_settings(name: impl Into<String>, settings: &EngineSettings) -> Self {
        Self {
            name: name.into(),
            description: None,
            variant: settings.variant.as_str().to_string(),
            polyphony: settings.capacity,
            sample_rate: ContextConfig::default().sample_rate as u32,
            master_gain: settings.master_gain,
            steal_mode: settings.steal_mode.as_str().to_string(),
            envelope: settings.adsr.into(),
            oscillator: OscillatorSection {
                waveform: settings.waveform.as_str().to_string(),
            },
            filter: settings.filter.into(),
            fm: settings.fm.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the sample rate hint.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the polyphony.
    pub fn with_polyphony(mut self, polyphony: usize) -> Self {
        self.polyphony = polyphony;
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), name = %config.name, "loaded engine config");
        Ok(config)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate and convert into settings for [`SynthEngine`](synthualizer_synth::SynthEngine).
    pub fn to_engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        validate_config(self)?;

        let envelope = self.envelope;
        Ok(EngineSettings {
            variant: parse_name("variant", &self.variant)?,
            capacity: self.polyphony,
            adsr: AdsrConfig::new(
                envelope.attack,
                envelope.decay,
                envelope.sustain,
                envelope.release,
            ),
            waveform: parse_name("oscillator.waveform", &self.oscillator.waveform)?,
            fm: FmPatch {
                carrier: parse_name("fm.carrier_waveform", &self.fm.carrier_waveform)?,
                modulator: parse_name("fm.modulator_waveform", &self.fm.modulator_waveform)?,
                ratio: self.fm.ratio,
                index: self.fm.index,
            },
            filter: FilterSettings {
                filter_type: parse_name("filter.type", &self.filter.filter_type)?,
                cutoff: self.filter.cutoff,
                resonance: self.filter.resonance,
            },
            master_gain: self.master_gain,
            steal_mode: parse_name("steal_mode", &self.steal_mode)?,
        })
    }

    /// Audio context settings for this configuration.
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig::with_sample_rate(self.sample_rate as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthualizer_synth::{EngineVariant, StealMode, SvfOutput, Waveform};

    #[test]
    fn default_matches_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.name, "Init");
        assert_eq!(config.polyphony, 6);
        assert_eq!(config.sample_rate, 48000);

        let settings = config.to_engine_settings().unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            name = "Bare"
            variant = "fm"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "Bare");
        assert_eq!(config.polyphony, 6);
        assert_eq!(config.envelope, EnvelopeSection::default());
        assert_eq!(config.filter.filter_type, "lowpass");

        let settings = config.to_engine_settings().unwrap();
        assert_eq!(settings.variant, EngineVariant::Fm);
    }

    #[test]
    fn parses_every_section() {
        let config = EngineConfig::from_toml(
            r#"
            name = "Full"
            description = "every field set"
            variant = "subtractive"
            polyphony = 8
            sample_rate = 44100
            master_gain = 0.5
            steal_mode = "hard"

            [envelope]
            attack = 0.2
            decay = 0.3
            sustain = 0.4
            release = 1.5

            [oscillator]
            waveform = "saw"

            [filter]
            type = "bandpass"
            cutoff = 800.0
            resonance = 4.0

            [fm]
            carrier_waveform = "triangle"
            modulator_waveform = "square"
            ratio = 3.5
            index = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.description.as_deref(), Some("every field set"));
        let settings = config.to_engine_settings().unwrap();
        assert_eq!(settings.capacity, 8);
        assert_eq!(settings.steal_mode, StealMode::Hard);
        assert_eq!(settings.waveform, Waveform::Sawtooth);
        assert_eq!(settings.filter.filter_type, SvfOutput::Bandpass);
        assert_eq!(settings.filter.cutoff, 800.0);
        assert_eq!(settings.fm.carrier, Waveform::Triangle);
        assert_eq!(settings.fm.modulator, Waveform::Square);
        assert_eq!(settings.adsr.release(), 1.5);
        assert_eq!(config.context_config().sample_rate, 44100.0);
    }

    #[test]
    fn filter_type_uses_type_key() {
        let toml = EngineConfig::default().to_toml().unwrap();
        assert!(toml.contains("type = \"lowpass\""), "{toml}");
        assert!(!toml.contains("filter_type"));
    }

    #[test]
    fn invalid_values_are_rejected_on_conversion() {
        let mut config = EngineConfig::default().with_polyphony(0);
        config.oscillator.waveform = "noise".into();
        let err = config.to_engine_settings().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("polyphony"), "{message}");
        assert!(message.contains("oscillator.waveform"), "{message}");
    }

    #[test]
    fn from_settings_round_trips() {
        let settings = EngineSettings {
            variant: EngineVariant::Fm,
            capacity: 4,
            steal_mode: StealMode::Hard,
            master_gain: 0.6,
            ..EngineSettings::default()
        };
        let config = EngineConfig::from_settings("Copy", &settings);
        let parsed = EngineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.to_engine_settings().unwrap(), settings);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml("polyphony = \"six\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
