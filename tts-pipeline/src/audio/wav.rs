//! WAV encoding and decoding with `hound`.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioData, RawAudio};
use crate::error::SynthesisError;

fn mono_float_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Encode mono samples as a 32-bit float WAV file in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), mono_float_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Write mono samples to `path` as a 32-bit float WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = WavWriter::create(path, mono_float_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Decode a WAV file into float samples.
///
/// Integer formats are scaled into [-1, 1]. Multi-channel audio keeps its
/// interleaved layout with shape `[frames, channels]`.
pub fn decode_wav(bytes: &[u8]) -> Result<RawAudio, SynthesisError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let data = match channels {
        0 => return Err(SynthesisError::Decode("WAV declares zero channels".to_string())),
        1 => AudioData::mono(samples),
        _ => {
            if samples.len() % channels != 0 {
                return Err(SynthesisError::Decode(format!(
                    "{} samples do not divide into {} channels",
                    samples.len(),
                    channels
                )));
            }
            let frames = samples.len() / channels;
            AudioData::with_shape(samples, vec![frames, channels])
        }
    };

    Ok(RawAudio {
        data,
        sample_rate: spec.sample_rate,
    })
}
