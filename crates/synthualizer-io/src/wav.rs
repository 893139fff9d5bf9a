//! WAV file writing (and reading back, for checks).

use crate::Result;
use hound::{SampleFormat, WavReader, WavWriter};
use std::path::Path;

/// Layout of a rendered WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Interleaved channel count.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
    /// 32 stores IEEE float; 8, 16 and 24 store signed PCM.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self::mono(48000)
    }
}

impl WavSpec {
    /// Mono 32-bit float at `sample_rate`.
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
        }
    }

    fn is_float(self) -> bool {
        self.bits_per_sample == 32
    }

    /// Full-scale magnitude of a PCM sample at this bit depth.
    fn pcm_scale(self) -> f32 {
        (1u32 << (self.bits_per_sample.clamp(2, 31) - 1)) as f32
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        let sample_format = if spec.is_float() {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        };
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format,
        }
    }
}

/// Write interleaved samples to a WAV file.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    let path = path.as_ref();
    let mut writer = WavWriter::create(path, spec.into())?;

    if spec.is_float() {
        samples.iter().try_for_each(|&s| writer.write_sample(s))?;
    } else {
        let scale = spec.pcm_scale();
        samples
            .iter()
            .map(|&s| (s * scale).clamp(-scale, scale - 1.0) as i32)
            .try_for_each(|s| writer.write_sample(s))?;
    }

    writer.finalize()?;
    tracing::info!(path = %path.display(), samples = samples.len(), "wrote wav");
    Ok(())
}

/// Read a WAV file as f32, averaging multi-channel frames down to mono.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    let reader = WavReader::open(path)?;
    let header = reader.spec();
    let spec = WavSpec {
        channels: header.channels,
        sample_rate: header.sample_rate,
        bits_per_sample: header.bits_per_sample,
    };

    let interleaved = if header.sample_format == SampleFormat::Float {
        reader.into_samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        let scale = spec.pcm_scale();
        reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / scale))
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let width = usize::from(spec.channels.max(1));
    if width == 1 {
        return Ok((interleaved, spec));
    }
    let mono = interleaved
        .chunks(width)
        .map(|frame| frame.iter().sum::<f32>() / width as f32)
        .collect();
    Ok((mono, spec))
}
