//! WAV file I/O
//!
//! Used by the offline renderer to feed files through a graph. Audio is
//! kept at the file's own sample rate; the engine is prepared to match it.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{PlexusError, Result};

/// Bit depth for exported WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 16-bit integer PCM
    Int16,
    /// 24-bit integer PCM
    #[default]
    Int24,
    /// 32-bit IEEE float
    Float32,
}

impl BitDepth {
    fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }
}

/// Read a WAV file into a buffer, converting samples to f32
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `UnsupportedFormat` - For integer bit depths other than 8/16/24/32
pub fn import_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(PlexusError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| PlexusError::InvalidAudio {
        reason: format!("failed to open {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(PlexusError::InvalidAudio {
            reason: "file declares zero channels".to_string(),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    Ok(AudioBuffer::from_channels(
        deinterleave(&interleaved, channels),
        spec.sample_rate,
    ))
}

/// Write a buffer to a WAV file at the buffer's sample rate
pub fn export_wav(buffer: &AudioBuffer, path: &Path, depth: BitDepth) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: depth.bits(),
        sample_format: match depth {
            BitDepth::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_write_error(path, e))?;

    for sample in buffer.to_interleaved() {
        let written = match depth {
            BitDepth::Int16 => writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16),
            BitDepth::Int24 => {
                // 24-bit stored as i32 in hound
                writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)
            }
            BitDepth::Float32 => writer.write_sample(sample),
        };
        written.map_err(|e| wav_write_error(path, e))?;
    }

    writer.finalize().map_err(|e| wav_write_error(path, e))?;
    Ok(())
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(1, num_samples);
    buffer.set_sample_rate(sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for (i, sample) in buffer.channel_mut(0).iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_write_error(path: &Path, err: hound::Error) -> PlexusError {
    match err {
        hound::Error::IoError(source) => PlexusError::io(path, source),
        other => PlexusError::InvalidAudio {
            reason: other.to_string(),
        },
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |e: hound::Error| PlexusError::InvalidAudio {
        reason: format!("failed to read samples: {}", e),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        (SampleFormat::Int, bits) => Err(PlexusError::UnsupportedFormat {
            format: format!("{}-bit integer audio", bits),
        }),
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for (i, sample) in samples.iter().enumerate() {
        result[i % channels].push(*sample);
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
