//! Realtime output through cpal.
//!
//! The stream owns the [`Renderer`]; the control side only sees the
//! [`AudioContext`] it was created with.

use std::any::Any;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use synthualizer_synth::{AudioContext, ContextConfig, EngineError, Renderer};

use crate::devices::{device_name, find_output_device};
use crate::{Error, Result};

/// Settings for [`start_output`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputConfig {
    /// Context settings; `sample_rate` is requested from the device.
    pub context: ContextConfig,
    /// Preferred buffer size in frames (device default if `None`).
    pub buffer_size: Option<u32>,
    /// Device index or name (default device if `None`).
    pub device: Option<String>,
}

impl OutputConfig {
    /// Output on `device` with `context` settings.
    pub fn new(context: ContextConfig, device: Option<String>) -> Self {
        Self {
            context,
            buffer_size: None,
            device,
        }
    }
}

/// Type-erased audio stream handle.
///
/// The stream plays while this handle exists; dropping it stops playback.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wrap a backend-specific stream object.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Acquire the shared audio context, starting a device stream if none is
/// running yet.
///
/// Returns the existing context unchanged when one is already open, so
/// every caller in the process shares one clock and one renderer.
pub fn start_output(config: &OutputConfig) -> Result<Arc<AudioContext>> {
    let context = AudioContext::acquire(config.context, |renderer| {
        let handle = open_stream(config, renderer).map_err(EngineError::from)?;
        let driver: Box<dyn Any + Send> = Box::new(handle);
        Ok(driver)
    })?;
    Ok(context)
}

/// Close the shared context and stop its stream.
pub fn stop_output() {
    AudioContext::release_shared();
}

fn open_stream(config: &OutputConfig, mut renderer: Renderer) -> Result<StreamHandle> {
    let host = cpal::default_host();
    let device = find_output_device(&host, config.device.as_deref())?;
    let channels = device
        .default_output_config()
        .map(|c| c.channels())
        .unwrap_or(2);
    let sample_rate = config.context.sample_rate as u32;

    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: config
            .buffer_size
            .map_or(cpal::BufferSize::Default, cpal::BufferSize::Fixed),
    };

    let frame_channels = usize::from(channels);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.process_interleaved(data, frame_channels);
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| Error::Stream(e.to_string()))?;

    stream.play().map_err(|e| Error::Stream(e.to_string()))?;
    tracing::info!(
        device = %device_name(&device).unwrap_or_default(),
        channels,
        sample_rate,
        "output stream started"
    );

    Ok(StreamHandle::new(stream))
}
