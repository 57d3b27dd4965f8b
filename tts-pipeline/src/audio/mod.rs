//! Audio buffers, stitching and WAV I/O.

pub mod concat;
pub mod filter;
pub mod wav;

pub use concat::{apply_fade, concatenate, peak_normalize, PEAK_TARGET};
pub use wav::{decode_wav, encode_wav, write_wav};

use crate::error::{PipelineError, Result};

/// A row-major, possibly multi-dimensional block of samples as returned by a
/// synthesis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub shape: Vec<usize>,
}

impl AudioData {
    /// A bare 1-D sample vector.
    pub fn mono(samples: Vec<f32>) -> Self {
        let shape = vec![samples.len()];
        Self { samples, shape }
    }

    /// Samples laid out with an explicit shape, e.g. `[channels, frames]` or
    /// `[frames, channels]` (interleaved).
    pub fn with_shape(samples: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { samples, shape }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Reduce to a single mono channel.
    ///
    /// 1-D data is used as-is. For 2-D data the shorter axis is taken to be
    /// the channel axis and the first channel is kept; on a tie the layout is
    /// read as `[frames, channels]`. Anything with more dimensions is
    /// flattened. 2-D data with a zero-sized axis has no channel to take.
    ///
    /// The shorter-axis rule is a heuristic: a fixture with more channels than
    /// frames will be read the wrong way round.
    pub fn into_mono(self, index: usize) -> Result<Vec<f32>> {
        self.check_shape(index)?;

        match self.shape.as_slice() {
            [_] => Ok(self.samples),
            [rows, cols] => {
                let (rows, cols) = (*rows, *cols);
                if rows.min(cols) == 0 {
                    // No channel to take
                    return Err(self.unsupported(index));
                }
                if rows < cols {
                    // [channels, frames]: first row
                    Ok(self.samples[..cols].to_vec())
                } else {
                    // [frames, channels]: first column
                    Ok(self.samples.iter().step_by(cols).copied().collect())
                }
            }
            _ => Ok(self.samples),
        }
    }

    /// Reshape to a single-channel `[1, frames]` container, taking the first
    /// channel of multi-channel data with the same rule as [`into_mono`].
    ///
    /// [`into_mono`]: AudioData::into_mono
    pub fn into_single_channel(self, index: usize) -> Result<AudioData> {
        let samples = self.into_mono(index)?;
        let frames = samples.len();
        Ok(AudioData::with_shape(samples, vec![1, frames]))
    }

    fn check_shape(&self, index: usize) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if self.shape.is_empty() || expected != self.samples.len() {
            return Err(self.unsupported(index));
        }
        Ok(())
    }

    fn unsupported(&self, index: usize) -> PipelineError {
        PipelineError::UnsupportedAudioShape {
            index,
            shape: self.shape.clone(),
            len: self.samples.len(),
        }
    }
}

/// What a synthesis backend returns for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    pub data: AudioData,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            data: AudioData::mono(samples),
            sample_rate,
        }
    }
}

/// Synthesized audio for one text chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Index of the originating text chunk
    pub index: usize,
    pub sample_rate: u32,
    pub data: AudioData,
}

impl AudioSegment {
    pub fn new(index: usize, raw: RawAudio) -> Self {
        Self {
            index,
            sample_rate: raw.sample_rate,
            data: raw.data,
        }
    }
}
