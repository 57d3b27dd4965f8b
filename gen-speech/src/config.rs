//! gen-speech configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tts_pipeline::SynthesisConfig;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenSpeechConfig {
    /// URL of the generate-audio endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Health check URL. Defaults to `health` next to the endpoint.
    #[serde(default)]
    pub health_endpoint: Option<String>,

    /// Default voice reference audio path for cloning
    #[serde(default)]
    pub voice_ref: Option<PathBuf>,

    /// Per-request timeout for the TTS service, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Chunking, stitching and concurrency settings
    #[serde(default)]
    pub pipeline: SynthesisConfig,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for GenSpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            health_endpoint: None,
            voice_ref: None,
            request_timeout_secs: default_request_timeout_secs(),
            pipeline: SynthesisConfig::default(),
        }
    }
}

impl GenSpeechConfig {
    /// Get the config file path: ~/.config/cli-programs/gen-speech.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cli-programs")
            .join("gen-speech.toml")
    }

    /// Load config from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: GenSpeechConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenSpeechConfig::default();
        assert!(config.endpoint.is_none());
        assert!(config.voice_ref.is_none());
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.pipeline.max_chunk_size, 800);
        assert_eq!(config.pipeline.max_concurrency, 4);
    }

    #[test]
    fn test_config_path() {
        let path = GenSpeechConfig::config_path();
        assert!(path.ends_with("cli-programs/gen-speech.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
endpoint = "https://tts.example.com/generate_audio"
voice_ref = "/path/to/voice.wav"
request_timeout_secs = 30

[pipeline]
max_chunk_size = 400
overlap_sentences = 1
max_concurrency = 1
"#;
        let config: GenSpeechConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://tts.example.com/generate_audio")
        );
        assert_eq!(config.voice_ref, Some(PathBuf::from("/path/to/voice.wav")));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.pipeline.max_chunk_size, 400);
        assert_eq!(config.pipeline.overlap_sentences, 1);
        assert_eq!(config.pipeline.max_concurrency, 1);
        assert_eq!(config.pipeline.silence_duration, 0.5);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: GenSpeechConfig = toml::from_str("").unwrap();
        assert_eq!(config, GenSpeechConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenSpeechConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, GenSpeechConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gen-speech.toml");

        let mut config = GenSpeechConfig::default();
        config.endpoint = Some("http://localhost:8000/generate_audio".to_string());
        config.pipeline.max_concurrency = 2;
        config.save_to(&path).unwrap();

        assert_eq!(GenSpeechConfig::load_from(&path).unwrap(), config);
    }
}
