//! Factory presets bundled with the library.
//!
//! These are always available without files on disk and serve as starting
//! points for user presets.

use crate::EngineConfig;

/// Factory preset identifiers, in display order.
pub static FACTORY_PRESET_NAMES: &[&str] = &["init", "pluck", "pad", "fm-bell"];

/// Embedded TOML for each factory preset.
static FACTORY_PRESETS_TOML: &[(&str, &str)] = &[
    ("init", INIT_PRESET),
    ("pluck", PLUCK_PRESET),
    ("pad", PAD_PRESET),
    ("fm-bell", FM_BELL_PRESET),
];

/// Engine defaults: six voices, sine, gentle envelope.
const INIT_PRESET: &str = r#"
name = "Init"
description = "Engine defaults - sine oscillator through an open lowpass"
variant = "subtractive"
polyphony = 6
sample_rate = 48000
master_gain = 0.8
steal_mode = "polite"

[envelope]
attack = 0.01
decay = 0.1
sustain = 0.7
release = 0.3

[oscillator]
waveform = "sine"

[filter]
type = "lowpass"
cutoff = 2000.0
resonance = 1.0
"#;

const PLUCK_PRESET: &str = r#"
name = "Pluck"
description = "Short sawtooth pluck with a resonant lowpass"
variant = "subtractive"
polyphony = 6
sample_rate = 48000
master_gain = 0.8
steal_mode = "hard"

[envelope]
attack = 0.002
decay = 0.18
sustain = 0.0
release = 0.12

[oscillator]
waveform = "sawtooth"

[filter]
type = "lowpass"
cutoff = 1400.0
resonance = 4.0
"#;

const PAD_PRESET: &str = r#"
name = "Pad"
description = "Slow triangle pad with a long release"
variant = "subtractive"
polyphony = 8
sample_rate = 48000
master_gain = 0.7
steal_mode = "polite"

[envelope]
attack = 1.2
decay = 0.8
sustain = 0.8
release = 2.5

[oscillator]
waveform = "triangle"

[filter]
type = "lowpass"
cutoff = 900.0
resonance = 0.7
"#;

const FM_BELL_PRESET: &str = r#"
name = "FM Bell"
description = "Inharmonic two-operator bell"
variant = "fm"
polyphony = 6
sample_rate = 48000
master_gain = 0.8
steal_mode = "polite"

[envelope]
attack = 0.001
decay = 1.6
sustain = 0.0
release = 1.2

[fm]
carrier_waveform = "sine"
modulator_waveform = "sine"
ratio = 3.5
index = 4.0
"#;

/// All factory presets, parsed.
///
/// # Example
///
/// ```rust
/// use synthualizer_config::factory_presets;
///
/// for preset in factory_presets() {
///     println!("{}: {}", preset.name, preset.description.as_deref().unwrap_or(""));
/// }
/// ```
pub fn factory_presets() -> Vec<EngineConfig> {
    FACTORY_PRESETS_TOML
        .iter()
        .filter_map(|(_, toml)| EngineConfig::from_toml(toml).ok())
        .collect()
}

/// Get a factory preset by identifier or display name, case-insensitively.
///
/// # Example
///
/// ```rust
/// use synthualizer_config::get_factory_preset;
///
/// let bell = get_factory_preset("FM Bell").unwrap();
/// assert_eq!(bell.variant, "fm");
/// ```
pub fn get_factory_preset(name: &str) -> Option<EngineConfig> {
    if let Some((_, toml)) = FACTORY_PRESETS_TOML
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(name))
    {
        return EngineConfig::from_toml(toml).ok();
    }

    factory_presets()
        .into_iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

/// Identifiers of all factory presets.
pub fn factory_preset_names() -> Vec<&'static str> {
    FACTORY_PRESETS_TOML.iter().map(|(name, _)| *name).collect()
}

/// Whether `name` refers to a factory preset.
///
/// ```rust
/// use synthualizer_config::is_factory_preset;
///
/// assert!(is_factory_preset("pad"));
/// assert!(is_factory_preset("Pluck"));
/// assert!(!is_factory_preset("my-lead"));
/// ```
pub fn is_factory_preset(name: &str) -> bool {
    get_factory_preset(name).is_some()
}
