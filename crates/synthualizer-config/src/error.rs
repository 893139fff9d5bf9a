//! Errors raised while loading, saving and applying engine configs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, saving or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config or preset file could not be read
    #[error("cannot read config '{path}': {source}")]
    ReadFile {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config or preset file could not be written
    #[error("cannot write config '{path}': {source}")]
    WriteFile {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the config layout
    #[error("invalid config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The config could not be encoded as TOML
    #[error("cannot encode config as TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// No factory or user preset with this name
    #[error("no preset named '{0}'")]
    PresetNotFound(String),

    /// Values outside their allowed ranges, or unknown names
    #[error("invalid engine config: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// A preset or config directory could not be created
    #[error("cannot create directory '{path}': {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// [`ConfigError::ReadFile`] for `path`.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::WriteFile`] for `path`.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::CreateDir`] for `path`.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use std::error::Error;

    fn denied() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn helpers_keep_the_path() {
        let err = ConfigError::read_file("/presets/pad.toml", denied());
        assert!(
            matches!(err, ConfigError::ReadFile { ref path, .. } if path == std::path::Path::new("/presets/pad.toml"))
        );

        let err = ConfigError::write_file("/out.toml", denied());
        assert!(matches!(err, ConfigError::WriteFile { .. }));

        let err = ConfigError::create_dir("/presets", denied());
        assert!(matches!(err, ConfigError::CreateDir { .. }));
    }

    #[test]
    fn io_variants_expose_source() {
        let err = ConfigError::write_file("/out.toml", denied());
        let source = err.source().expect("io source");
        assert_eq!(source.to_string(), "denied");
        assert!(err.to_string().contains("/out.toml"));
    }

    #[test]
    fn validation_converts_with_question_mark() {
        fn check() -> Result<(), ConfigError> {
            let polyphony = ValidationError::OutOfRange {
                param: "polyphony".into(),
                value: 0.0,
                min: 1.0,
                max: 32.0,
            };
            Err(polyphony)?;
            Ok(())
        }
        let err = check().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("polyphony"));
    }

    #[test]
    fn preset_not_found_names_the_preset() {
        let err = ConfigError::PresetNotFound("warm-lead".into());
        assert_eq!(err.to_string(), "no preset named 'warm-lead'");
    }
}
