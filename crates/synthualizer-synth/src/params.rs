//! Typed engine parameters.
//!
//! Collaborators that speak in strings (a UI slider named `"cutoff"`, a
//! preset file) go through [`EngineParam::parse`]; everything inside the
//! engine works with the typed enum. Parsing validates the value's shape
//! (number vs. name, finite) but not its range: ranges are clamped where the
//! value is used.
//!
//! | Name | Variant | Value |
//! |------|---------|-------|
//! | `cutoff` | [`FilterParam::Cutoff`] | Hz |
//! | `resonance` | [`FilterParam::Resonance`] | Q |
//! | `filterType` | [`FilterParam::Type`] | `lowpass`, `highpass`, `bandpass`, `notch` |
//! | `waveform` | [`OscillatorParam::Waveform`] | `sine`, `square`, `sawtooth`, `triangle` |
//! | `attack`, `decay`, `release` | [`EnvelopeParam`] | seconds |
//! | `sustain` | [`EnvelopeParam::Sustain`] | `0..=1` |
//! | `modulationIndex` | [`FmParam::ModulationIndex`] | multiple of carrier |
//! | `frequencyRatio` | [`FmParam::FrequencyRatio`] | multiple of carrier |
//! | `carrierWaveform`, `modulatorWaveform` | [`FmParam`] | waveform name |
//! | `masterGain` | [`MixerParam::MasterGain`] | linear gain |

use std::fmt;

use synthualizer_core::SvfOutput;
use thiserror::Error;

use crate::oscillator::Waveform;

/// Shared filter parameters (subtractive engine only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterParam {
    /// Cutoff frequency in Hz.
    Cutoff(f32),
    /// Resonance (Q).
    Resonance(f32),
    /// Filter response.
    Type(SvfOutput),
}

/// ADSR parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeParam {
    /// Attack time in seconds.
    Attack(f64),
    /// Decay time in seconds.
    Decay(f64),
    /// Sustain level, fraction of peak.
    Sustain(f32),
    /// Release time in seconds.
    Release(f64),
}

/// Oscillator parameters (subtractive engine).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscillatorParam {
    /// Oscillator waveform.
    Waveform(Waveform),
}

/// FM parameters (FM engine only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FmParam {
    /// Modulation depth as a multiple of the carrier frequency.
    ModulationIndex(f32),
    /// Modulator frequency as a multiple of the carrier frequency.
    FrequencyRatio(f32),
    /// Carrier waveform.
    CarrierWaveform(Waveform),
    /// Modulator waveform.
    ModulatorWaveform(Waveform),
}

/// Output stage parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixerParam {
    /// Linear output gain.
    MasterGain(f32),
}

/// Any parameter the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineParam {
    /// Shared filter.
    Filter(FilterParam),
    /// Envelope timing.
    Envelope(EnvelopeParam),
    /// Subtractive oscillator.
    Oscillator(OscillatorParam),
    /// FM operators.
    Fm(FmParam),
    /// Output stage.
    Mixer(MixerParam),
}

/// A raw parameter value from the string boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A number.
    Number(f64),
    /// A name, such as a waveform or filter type.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Why a parameter update was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The name is not a known parameter.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// The value has the wrong shape for the parameter.
    #[error("invalid value {value} for parameter '{param}'")]
    InvalidValue {
        /// Parameter name.
        param: String,
        /// Rejected value, rendered.
        value: String,
    },

    /// The parameter does not exist on this engine variant.
    #[error("parameter '{param}' is not supported by the {variant} engine")]
    NotSupported {
        /// Parameter name.
        param: &'static str,
        /// Engine variant name.
        variant: &'static str,
    },
}

impl ParamError {
    fn invalid(param: &str, value: &ParamValue) -> Self {
        Self::InvalidValue {
            param: param.to_owned(),
            value: value.to_string(),
        }
    }
}

fn number(param: &str, value: &ParamValue) -> Result<f64, ParamError> {
    let n = match value {
        ParamValue::Number(n) => *n,
        ParamValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ParamError::invalid(param, value))?,
    };
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ParamError::invalid(param, value))
    }
}

fn waveform(param: &str, value: &ParamValue) -> Result<Waveform, ParamError> {
    match value {
        ParamValue::Text(s) => s.parse().map_err(|_| ParamError::invalid(param, value)),
        ParamValue::Number(_) => Err(ParamError::invalid(param, value)),
    }
}

impl EngineParam {
    /// Parse a named parameter from the string boundary.
    ///
    /// # Example
    ///
    /// ```rust
    /// use synthualizer_synth::{EngineParam, FilterParam, ParamError};
    ///
    /// let param = EngineParam::parse("cutoff", 800.0).unwrap();
    /// assert_eq!(param, EngineParam::Filter(FilterParam::Cutoff(800.0)));
    ///
    /// let err = EngineParam::parse("wobble", 1.0).unwrap_err();
    /// assert!(matches!(err, ParamError::UnknownParameter(_)));
    /// ```
    pub fn parse(name: &str, value: impl Into<ParamValue>) -> Result<Self, ParamError> {
        let value = value.into();
        let v = &value;
        let param = match name {
            "cutoff" => Self::Filter(FilterParam::Cutoff(number(name, v)? as f32)),
            "resonance" => Self::Filter(FilterParam::Resonance(number(name, v)? as f32)),
            "filterType" => match v {
                ParamValue::Text(s) => Self::Filter(FilterParam::Type(
                    s.parse().map_err(|_| ParamError::invalid(name, v))?,
                )),
                ParamValue::Number(_) => return Err(ParamError::invalid(name, v)),
            },
            "waveform" => Self::Oscillator(OscillatorParam::Waveform(waveform(name, v)?)),
            "attack" => Self::Envelope(EnvelopeParam::Attack(number(name, v)?)),
            "decay" => Self::Envelope(EnvelopeParam::Decay(number(name, v)?)),
            "sustain" => Self::Envelope(EnvelopeParam::Sustain(number(name, v)? as f32)),
            "release" => Self::Envelope(EnvelopeParam::Release(number(name, v)?)),
            "modulationIndex" => Self::Fm(FmParam::ModulationIndex(number(name, v)? as f32)),
            "frequencyRatio" => Self::Fm(FmParam::FrequencyRatio(number(name, v)? as f32)),
            "carrierWaveform" => Self::Fm(FmParam::CarrierWaveform(waveform(name, v)?)),
            "modulatorWaveform" => Self::Fm(FmParam::ModulatorWaveform(waveform(name, v)?)),
            "masterGain" => Self::Mixer(MixerParam::MasterGain(number(name, v)? as f32)),
            _ => return Err(ParamError::UnknownParameter(name.to_owned())),
        };
        Ok(param)
    }

    /// The string-boundary name of this parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filter(FilterParam::Cutoff(_)) => "cutoff",
            Self::Filter(FilterParam::Resonance(_)) => "resonance",
            Self::Filter(FilterParam::Type(_)) => "filterType",
            Self::Oscillator(OscillatorParam::Waveform(_)) => "waveform",
            Self::Envelope(EnvelopeParam::Attack(_)) => "attack",
            Self::Envelope(EnvelopeParam::Decay(_)) => "decay",
            Self::Envelope(EnvelopeParam::Sustain(_)) => "sustain",
            Self::Envelope(EnvelopeParam::Release(_)) => "release",
            Self::Fm(FmParam::ModulationIndex(_)) => "modulationIndex",
            Self::Fm(FmParam::FrequencyRatio(_)) => "frequencyRatio",
            Self::Fm(FmParam::CarrierWaveform(_)) => "carrierWaveform",
            Self::Fm(FmParam::ModulatorWaveform(_)) => "modulatorWaveform",
            Self::Mixer(MixerParam::MasterGain(_)) => "masterGain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_name() {
        let cases: &[(&str, ParamValue)] = &[
            ("cutoff", ParamValue::Number(1000.0)),
            ("resonance", ParamValue::Number(2.0)),
            ("filterType", ParamValue::from("notch")),
            ("waveform", ParamValue::from("saw")),
            ("attack", ParamValue::Number(0.1)),
            ("decay", ParamValue::Number(0.2)),
            ("sustain", ParamValue::Number(0.5)),
            ("release", ParamValue::Number(1.0)),
            ("modulationIndex", ParamValue::Number(3.0)),
            ("frequencyRatio", ParamValue::Number(1.5)),
            ("carrierWaveform", ParamValue::from("triangle")),
            ("modulatorWaveform", ParamValue::from("square")),
            ("masterGain", ParamValue::Number(0.5)),
        ];
        for (name, value) in cases {
            let param = EngineParam::parse(name, value.clone())
                .unwrap_or_else(|e| panic!("{name} failed: {e}"));
            assert_eq!(param.name(), *name);
        }
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            EngineParam::parse("waveform", "sawtooth"),
            Ok(EngineParam::Oscillator(OscillatorParam::Waveform(
                Waveform::Sawtooth
            )))
        );
        assert_eq!(
            EngineParam::parse("filterType", "highpass"),
            Ok(EngineParam::Filter(FilterParam::Type(SvfOutput::Highpass)))
        );
        assert_eq!(
            EngineParam::parse("attack", "0.25"),
            Ok(EngineParam::Envelope(EnvelopeParam::Attack(0.25)))
        );
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            EngineParam::parse("Cutoff", 100.0),
            Err(ParamError::UnknownParameter("Cutoff".into()))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            EngineParam::parse("cutoff", f64::NAN),
            Err(ParamError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineParam::parse("cutoff", "loud"),
            Err(ParamError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineParam::parse("waveform", 2.0),
            Err(ParamError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineParam::parse("filterType", "comb"),
            Err(ParamError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = ParamError::NotSupported {
            param: "cutoff",
            variant: "fm",
        };
        assert_eq!(
            err.to_string(),
            "parameter 'cutoff' is not supported by the fm engine"
        );
    }
}
