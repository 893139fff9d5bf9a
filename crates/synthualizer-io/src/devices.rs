//! Output device enumeration via cpal.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the host's default output.
    pub is_default: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
}

impl AudioDevice {
    fn describe(device: &Device, is_default: bool) -> Option<Self> {
        let name = device_name(device).ok()?;
        let config = device.default_output_config().ok();
        Some(Self {
            name,
            is_default,
            default_sample_rate: config
                .as_ref()
                .map(|c| c.sample_rate())
                .unwrap_or(FALLBACK_SAMPLE_RATE),
            channels: config.map(|c| c.channels()).unwrap_or(2),
        })
    }
}

/// List all output devices of the default host.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| device_name(&d).ok());

    let Ok(outputs) = host.output_devices() else {
        return Ok(Vec::new());
    };

    Ok(outputs
        .filter_map(|device| {
            let name = device_name(&device).ok();
            let is_default = name.is_some() && name == default_name;
            AudioDevice::describe(&device, is_default)
        })
        .collect())
}

/// The default output device, if the host has one.
pub fn default_device() -> Result<Option<AudioDevice>> {
    let host = cpal::default_host();
    Ok(host
        .default_output_device()
        .and_then(|d| AudioDevice::describe(&d, true)))
}

/// Find an output device by index, exact name, or case-insensitive partial
/// name. `None` selects the default device.
pub(crate) fn find_output_device(host: &Host, name_or_index: Option<&str>) -> Result<Device> {
    let Some(search) = name_or_index else {
        return host.default_output_device().ok_or(Error::NoDevice);
    };

    let devices: Vec<Device> = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?
        .collect();
    let names: Vec<Option<String>> = devices.iter().map(|d| device_name(d).ok()).collect();

    let position = match_device(&names, search)?;
    devices
        .get(position)
        .cloned()
        .ok_or_else(|| Error::DeviceNotFound(search.to_string()))
}

/// Pick a device position from its name list.
fn match_device(names: &[Option<String>], search: &str) -> Result<usize> {
    if let Ok(index) = search.parse::<usize>() {
        return if index < names.len() {
            Ok(index)
        } else {
            Err(Error::DeviceNotFound(format!(
                "output device index {} (only {} devices available)",
                index,
                names.len()
            )))
        };
    }

    if let Some(exact) = names.iter().position(|n| n.as_deref() == Some(search)) {
        return Ok(exact);
    }

    let search_lower = search.to_lowercase();
    let matches: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            name.as_ref()
                .is_some_and(|n| n.to_lowercase().contains(&search_lower))
        })
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(Error::DeviceNotFound(format!(
            "no output device matching '{}'",
            search
        ))),
        [only] => Ok(*only),
        [first, ..] => {
            tracing::warn!(
                search,
                candidates = matches.len(),
                "several output devices match, using the first"
            );
            Ok(*first)
        }
    }
}
