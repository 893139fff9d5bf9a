//! Engine configuration validation.
//!
//! Ranges are checked on the raw configuration before it is turned into
//! [`EngineSettings`](synthualizer_synth::EngineSettings), so a preset file
//! with several mistakes reports all of them at once.
//!
//! # Example
//!
//! ```rust
//! use synthualizer_config::{EngineConfig, validate_config};
//!
//! let mut config = EngineConfig::default();
//! assert!(validate_config(&config).is_ok());
//!
//! config.polyphony = 64;
//! assert!(validate_config(&config).is_err());
//! ```

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use synthualizer_synth::{EngineVariant, StealMode, SvfOutput, Waveform};
use thiserror::Error;

use crate::engine_config::EngineConfig;

/// Allowed voice counts.
pub const POLYPHONY_RANGE: RangeInclusive<u32> = 1..=32;
/// Allowed sample rates in Hz.
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8000..=192_000;
/// Allowed filter cutoffs in Hz.
pub const CUTOFF_RANGE: RangeInclusive<f32> = 20.0..=20000.0;
/// Allowed filter resonance.
pub const RESONANCE_RANGE: RangeInclusive<f32> = 0.1..=20.0;
/// Allowed attack, decay and release times in seconds.
pub const ENVELOPE_TIME_RANGE: RangeInclusive<f64> = 0.0..=10.0;
/// Allowed sustain levels.
pub const SUSTAIN_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Allowed master gain.
pub const MASTER_GAIN_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Allowed FM frequency ratios.
pub const FM_RATIO_RANGE: RangeInclusive<f32> = 0.125..=16.0;
/// Allowed FM modulation indices.
pub const FM_INDEX_RANGE: RangeInclusive<f32> = 0.0..=20.0;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Value out of range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the parameter.
        param: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Unrecognized name for an enumerated setting.
    #[error("invalid format for parameter '{param}': {reason}")]
    InvalidFormat {
        /// Name of the parameter.
        param: String,
        /// Description of the format error.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check that `value` lies in `range`. NaN is always out of range.
pub fn validate_range<T>(param: &str, value: T, range: &RangeInclusive<T>) -> ValidationResult<()>
where
    T: PartialOrd + Copy + Into<f64>,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            param: param.to_string(),
            value: value.into(),
            min: (*range.start()).into(),
            max: (*range.end()).into(),
        })
    }
}

/// Parse a named setting such as a waveform or filter type.
pub fn parse_name<T>(param: &str, value: &str) -> ValidationResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ValidationError::InvalidFormat {
            param: param.to_string(),
            reason: e.to_string(),
        })
}

/// Validate every field of `config`.
///
/// Returns the single error when only one field is wrong, and
/// [`ValidationError::Multiple`] otherwise.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    let envelope = &config.envelope;
    let checks = [
        validate_range(
            "polyphony",
            u32::try_from(config.polyphony).unwrap_or(u32::MAX),
            &POLYPHONY_RANGE,
        ),
        validate_range("sample_rate", config.sample_rate, &SAMPLE_RATE_RANGE),
        validate_range("master_gain", config.master_gain, &MASTER_GAIN_RANGE),
        validate_range("envelope.attack", envelope.attack, &ENVELOPE_TIME_RANGE),
        validate_range("envelope.decay", envelope.decay, &ENVELOPE_TIME_RANGE),
        validate_range("envelope.sustain", envelope.sustain, &SUSTAIN_RANGE),
        validate_range("envelope.release", envelope.release, &ENVELOPE_TIME_RANGE),
        validate_range("filter.cutoff", config.filter.cutoff, &CUTOFF_RANGE),
        validate_range("filter.resonance", config.filter.resonance, &RESONANCE_RANGE),
        validate_range("fm.ratio", config.fm.ratio, &FM_RATIO_RANGE),
        validate_range("fm.index", config.fm.index, &FM_INDEX_RANGE),
        parse_name::<EngineVariant>("variant", &config.variant).map(drop),
        parse_name::<StealMode>("steal_mode", &config.steal_mode).map(drop),
        parse_name::<Waveform>("oscillator.waveform", &config.oscillator.waveform).map(drop),
        parse_name::<SvfOutput>("filter.type", &config.filter.filter_type).map(drop),
        parse_name::<Waveform>("fm.carrier_waveform", &config.fm.carrier_waveform).map(drop),
        parse_name::<Waveform>("fm.modulator_waveform", &config.fm.modulator_waveform)
            .map(drop),
    ];

    let mut errors: Vec<ValidationError> = checks.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
