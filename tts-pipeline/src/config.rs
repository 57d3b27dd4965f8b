//! Parameters for a single long-text synthesis run.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

const DEFAULT_MAX_CHUNK_SIZE: usize = 800;
const DEFAULT_SILENCE_DURATION: f32 = 0.5;
const DEFAULT_FADE_DURATION: f32 = 0.1;
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Upper bound for silence and fade lengths, in seconds.
pub const MAX_DURATION_SECS: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Maximum characters per chunk (before overlap is added)
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Sentences repeated from the previous chunk at the start of the next
    #[serde(default)]
    pub overlap_sentences: usize,

    /// Silence inserted between segments, in seconds
    #[serde(default = "default_silence_duration")]
    pub silence_duration: f32,

    /// Linear fade in/out applied to each segment, in seconds
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f32,

    /// Width of the synthesis worker pool. Use 1 for backends that are not
    /// safe to call concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_silence_duration() -> f32 {
    DEFAULT_SILENCE_DURATION
}

fn default_fade_duration() -> f32 {
    DEFAULT_FADE_DURATION
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap_sentences: 0,
            silence_duration: default_silence_duration(),
            fade_duration: default_fade_duration(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl SynthesisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn with_overlap_sentences(mut self, overlap_sentences: usize) -> Self {
        self.overlap_sentences = overlap_sentences;
        self
    }

    pub fn with_silence_duration(mut self, seconds: f32) -> Self {
        self.silence_duration = seconds;
        self
    }

    pub fn with_fade_duration(mut self, seconds: f32) -> Self {
        self.fade_duration = seconds;
        self
    }

    pub fn with_max_concurrency(mut self, width: usize) -> Self {
        self.max_concurrency = width;
        self
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        check_duration("silence_duration", self.silence_duration)?;
        check_duration("fade_duration", self.fade_duration)?;
        Ok(())
    }

    /// Silence between segments in samples.
    pub fn silence_samples(&self, sample_rate: u32) -> usize {
        (self.silence_duration as f64 * sample_rate as f64).round() as usize
    }

    /// Fade window length in samples.
    pub fn fade_samples(&self, sample_rate: u32) -> usize {
        (self.fade_duration as f64 * sample_rate as f64) as usize
    }
}

fn check_duration(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    if value > MAX_DURATION_SECS {
        return Err(PipelineError::InvalidConfig(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_DURATION_SECS, value
        )));
    }
    Ok(())
}
