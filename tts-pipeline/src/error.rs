use thiserror::Error;

/// Failure reported by a synthesis backend for a single call.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Synthesis backend error: {0}")]
    Backend(String),
}

impl From<hound::Error> for SynthesisError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => SynthesisError::Io(e),
            other => SynthesisError::Decode(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chunk {index} is empty; refusing to synthesize empty text")]
    EmptyChunk { index: usize },

    #[error("Text failed to synthesize at chunk {index} ({succeeded}/{attempted} chunks succeeded): {source}")]
    ChunkSynthesis {
        index: usize,
        attempted: usize,
        succeeded: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("Only {succeeded} of {requested} chunks were synthesized")]
    IncompleteSynthesis { requested: usize, succeeded: usize },

    #[error("Failed to load voice reference {voice}: {source}")]
    VoiceLoad {
        voice: String,
        #[source]
        source: SynthesisError,
    },

    #[error("Nothing to concatenate: no audio segments were supplied")]
    NoSegments,

    #[error("Nothing to concatenate: all {dropped} audio segments were empty")]
    AllSegmentsEmpty { dropped: usize },

    #[error("Unsupported audio shape {shape:?} for segment {index} ({len} samples)")]
    UnsupportedAudioShape {
        index: usize,
        shape: Vec<usize>,
        len: usize,
    },

    #[error("Deadline exceeded after {completed}/{total} chunks")]
    DeadlineExceeded { completed: usize, total: usize },

    #[error("Cancelled after {completed}/{total} chunks")]
    Cancelled { completed: usize, total: usize },

    #[error("Synthesis worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
}

impl PipelineError {
    /// Index of the chunk whose synthesis failed, if this is a chunk-level failure.
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            PipelineError::ChunkSynthesis { index, .. } => Some(*index),
            PipelineError::EmptyChunk { index } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
