//! Configuration and preset management for synthualizer.
//!
//! An [`EngineConfig`] is the TOML form of
//! [`EngineSettings`](synthualizer_synth::EngineSettings): engine variant,
//! polyphony, envelope, oscillator, filter and FM settings.
//!
//! # Features
//!
//! - **Engine config**: Load and save engine setups from TOML files
//! - **Validation**: Range and name checks, reported together
//! - **Factory presets**: `init`, `pluck`, `pad` and `fm-bell`
//! - **Paths**: User preset directory (`std` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use synthualizer_config::{EngineConfig, get_factory_preset, user_presets_dir};
//!
//! let pad = get_factory_preset("pad").unwrap();
//! let settings = pad.to_engine_settings().unwrap();
//! assert_eq!(settings.capacity, 8);
//!
//! let mine = EngineConfig::new("Wide Pad").with_polyphony(12);
//! mine.save(user_presets_dir().join("wide-pad.toml")).unwrap();
//! ```

mod engine_config;
mod error;

/// Platform-specific preset locations.
#[cfg(feature = "std")]
pub mod paths;

/// Range and name validation.
pub mod validation;

/// Presets bundled with the library.
pub mod factory_presets;

pub use engine_config::{EngineConfig, EnvelopeSection, FilterSection, FmSection, OscillatorSection};
pub use error::ConfigError;
pub use factory_presets::{
    FACTORY_PRESET_NAMES, factory_preset_names, factory_presets, get_factory_preset,
    is_factory_preset,
};
#[cfg(feature = "std")]
pub use paths::{
    APP_NAME, ensure_user_presets_dir, find_preset, list_presets_in_dir, list_user_presets,
    load_preset, preset_name_from_path, user_config_dir, user_presets_dir,
};
pub use validation::{ValidationError, ValidationResult, parse_name, validate_config, validate_range};
