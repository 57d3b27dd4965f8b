//! Speech synthesis backends.
//!
//! The pipeline treats the neural model as a black box behind the
//! [`Synthesizer`] trait: text (plus an optional voice to clone) in, raw audio
//! out. Backends must be safe to call from several tasks at once unless the
//! caller limits the worker pool to a single task.

pub mod http;
pub mod mock;

pub use http::{HealthStatus, HttpSynthesizer};
pub use mock::MockSynthesizer;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::audio::RawAudio;
use crate::error::SynthesisError;

/// Reference audio for voice cloning, shared read-only across every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceReference {
    /// Encoded audio (usually WAV) held in memory
    Bytes(Vec<u8>),
    /// Path to an audio file on disk
    File(PathBuf),
}

impl VoiceReference {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        VoiceReference::File(path.into())
    }

    /// The encoded audio, reading it from disk if needed.
    pub async fn load_bytes(&self) -> Result<Vec<u8>, SynthesisError> {
        match self {
            VoiceReference::Bytes(bytes) => Ok(bytes.clone()),
            VoiceReference::File(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    /// Read a file reference into memory so every chunk clones the same audio.
    pub async fn resolve(self) -> Result<Self, SynthesisError> {
        match self {
            VoiceReference::File(path) => Ok(VoiceReference::Bytes(tokio::fs::read(path).await?)),
            bytes => Ok(bytes),
        }
    }

    /// Short description for log output.
    pub fn describe(&self) -> String {
        match self {
            VoiceReference::Bytes(bytes) => format!("{} bytes of audio", bytes.len()),
            VoiceReference::File(path) => path.display().to_string(),
        }
    }
}

/// A text-to-speech backend.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one chunk of text, optionally cloning `voice`.
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceReference>,
    ) -> Result<RawAudio, SynthesisError>;

    /// Backend name for display.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_voice_bytes_load_without_io() {
        let voice = VoiceReference::Bytes(vec![1, 2, 3]);
        assert_eq!(voice.load_bytes().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(voice.describe(), "3 bytes of audio");
    }

    #[tokio::test]
    async fn test_voice_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let voice = VoiceReference::from_file(&path);
        assert_eq!(voice.load_bytes().await.unwrap(), b"RIFF".to_vec());
    }

    #[tokio::test]
    async fn test_resolve_reads_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let voice = VoiceReference::from_file(&path).resolve().await.unwrap();
        std::fs::write(&path, b"changed").unwrap();
        assert_eq!(voice, VoiceReference::Bytes(b"RIFF".to_vec()));
        assert_eq!(voice.load_bytes().await.unwrap(), b"RIFF".to_vec());
    }

    #[tokio::test]
    async fn test_missing_voice_file_is_io_error() {
        let voice = VoiceReference::from_file("/nonexistent/voice.wav");
        assert!(matches!(
            voice.load_bytes().await,
            Err(SynthesisError::Io(_))
        ));
    }
}
