//! Audio I/O for synthualizer.
//!
//! This crate provides:
//!
//! - **Device output**: [`start_output`] acquires the shared
//!   [`AudioContext`](synthualizer_synth::AudioContext) and drives its
//!   renderer from a cpal output stream
//! - **Devices**: [`list_devices`] and [`default_device`]
//! - **Offline rendering**: [`render_offline`] runs a renderer without a device
//! - **WAV files**: [`write_wav`] and [`read_wav`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use synthualizer_io::{OutputConfig, start_output, stop_output};
//! use synthualizer_synth::{EngineSettings, SynthEngine};
//!
//! let context = start_output(&OutputConfig::default())?;
//! let mut engine: SynthEngine = SynthEngine::new(context, EngineSettings::default())?;
//! engine.note_on(220.0, 0.8);
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! engine.note_off(220.0);
//! drop(engine);
//! stop_output();
//! ```

mod devices;
mod offline;
mod output;
mod wav;

pub use devices::{AudioDevice, default_device, list_devices};
pub use offline::{DEFAULT_BLOCK_SIZE, render_offline};
pub use output::{OutputConfig, StreamHandle, start_output, stop_output};
pub use wav::{WavSpec, read_wav, write_wav};

use synthualizer_synth::EngineError;

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The audio context could not be created or was closed.
    #[error("Audio context error: {0}")]
    Engine(#[from] EngineError),
}

impl From<Error> for EngineError {
    fn from(error: Error) -> Self {
        match error {
            Error::Engine(inner) => inner,
            other => EngineError::Backend(other.to_string()),
        }
    }
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
