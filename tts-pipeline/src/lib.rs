//! Long-text speech synthesis pipeline
//!
//! Splits arbitrarily long text into model-sized chunks, synthesizes them in
//! parallel through a pluggable backend, and stitches the audio back into one
//! waveform:
//! - `text`: paragraph/sentence-aware chunking with optional overlap
//! - `coordinator`: bounded, order-preserving parallel synthesis
//! - `audio`: normalization, fades, silence and high-pass clean-up
//! - `pipeline`: the end-to-end run with progress hooks

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod synth;
pub mod text;

pub use audio::{AudioData, AudioSegment, RawAudio};
pub use config::SynthesisConfig;
pub use coordinator::{CancelHandle, RunControl};
pub use error::{PipelineError, Result, SynthesisError};
pub use pipeline::{
    NoopObserver, Pipeline, PipelineMetadata, PipelineObserver, PipelineResult, PipelineStage,
};
pub use synth::{HttpSynthesizer, MockSynthesizer, Synthesizer, VoiceReference};
pub use text::{chunk_text, ChunkStats, TextChunk};
