//! End-to-end run: chunk text, synthesize chunks, stitch the audio.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::wav::encode_wav;
use crate::audio::{concatenate, AudioData};
use crate::config::SynthesisConfig;
use crate::coordinator::{synthesize_chunks, RunControl};
use crate::error::{PipelineError, Result};
use crate::synth::{Synthesizer, VoiceReference};
use crate::text::{chunk_stats, chunk_text, ChunkStats};

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStage {
    Chunking,
    Synthesizing,
    Concatenating,
    Done,
    Failed(String),
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Chunking => write!(f, "chunking"),
            PipelineStage::Synthesizing => write!(f, "synthesizing"),
            PipelineStage::Concatenating => write!(f, "concatenating"),
            PipelineStage::Done => write!(f, "done"),
            PipelineStage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Hooks for progress reporting. All methods default to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn on_stage(&self, _stage: &PipelineStage) {}

    fn on_chunk_synthesized(&self, _index: usize, _completed: usize, _total: usize) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Counts describing how a run went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetadata {
    pub requested_chunks: usize,
    pub synthesized_chunks: usize,
    pub failed_chunks: usize,
    /// Characters in the original input
    pub total_characters: usize,
    pub chunk_stats: ChunkStats,
    pub processing_time_ms: u64,
}

/// Final audio of a run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Single-channel audio with shape `[1, frames]`
    pub audio: AudioData,
    /// Zero when there was nothing to synthesize
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub metadata: PipelineMetadata,
}

impl PipelineResult {
    pub fn samples(&self) -> &[f32] {
        &self.audio.samples
    }

    /// True when the input had no text to speak.
    pub fn is_empty(&self) -> bool {
        self.audio.samples.is_empty()
    }

    /// Encode as a mono 32-bit float WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_wav(self.samples(), self.sample_rate)?)
    }

    /// WAV bytes as standard base64, for JSON transports.
    pub fn to_base64_wav(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_wav_bytes()?))
    }
}

/// Long-text synthesis pipeline bound to one backend and configuration.
pub struct Pipeline {
    synthesizer: Arc<dyn Synthesizer>,
    config: SynthesisConfig,
}

impl Pipeline {
    /// Create a pipeline, rejecting an invalid configuration up front.
    pub fn new(synthesizer: Arc<dyn Synthesizer>, config: SynthesisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            synthesizer,
            config,
        })
    }

    /// Run the pipeline over `text`, cloning `voice` for every chunk.
    pub async fn run(
        &self,
        text: &str,
        voice: Option<VoiceReference>,
        control: &RunControl,
    ) -> Result<PipelineResult> {
        self.run_with_observer(text, voice, control, &NoopObserver)
            .await
    }

    /// Like [`run`](Pipeline::run), reporting progress to `observer`.
    pub async fn run_with_observer(
        &self,
        text: &str,
        voice: Option<VoiceReference>,
        control: &RunControl,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineResult> {
        match self.execute(text, voice, control, observer).await {
            Ok(result) => {
                observer.on_stage(&PipelineStage::Done);
                Ok(result)
            }
            Err(e) => {
                warn!("Pipeline failed: {}", e);
                observer.on_stage(&PipelineStage::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        text: &str,
        voice: Option<VoiceReference>,
        control: &RunControl,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineResult> {
        let start = Instant::now();

        observer.on_stage(&PipelineStage::Chunking);
        let chunks = chunk_text(text, &self.config)?;
        let stats = chunk_stats(&chunks);
        let total_characters = text.chars().count();
        let requested = chunks.len();

        let metadata = |synthesized: usize| PipelineMetadata {
            requested_chunks: requested,
            synthesized_chunks: synthesized,
            failed_chunks: requested - synthesized,
            total_characters,
            chunk_stats: stats.clone(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        if chunks.is_empty() {
            info!("No input text; nothing to synthesize");
            return Ok(PipelineResult {
                audio: AudioData::with_shape(Vec::new(), vec![1, 0]),
                sample_rate: 0,
                duration_secs: 0.0,
                metadata: metadata(0),
            });
        }

        info!(
            "Split {} characters into {} chunks (avg {:.0}, max {})",
            total_characters, requested, stats.avg_chunk_size, stats.max_chunk_size
        );
        let voice = match voice {
            Some(voice) => {
                let described = voice.describe();
                info!("Cloning voice from {}", described);
                let resolved = voice.resolve().await.map_err(|source| {
                    PipelineError::VoiceLoad {
                        voice: described,
                        source,
                    }
                })?;
                Some(Arc::new(resolved))
            }
            None => None,
        };

        observer.on_stage(&PipelineStage::Synthesizing);
        let segments = synthesize_chunks(
            chunks,
            Arc::clone(&self.synthesizer),
            voice,
            self.config.max_concurrency,
            control,
            |progress| {
                observer.on_chunk_synthesized(progress.index, progress.completed, progress.total)
            },
        )
        .await?;

        let synthesized = segments.len();
        if synthesized < requested {
            return Err(PipelineError::IncompleteSynthesis {
                requested,
                succeeded: synthesized,
            });
        }
        if let Some(reason) = control.check() {
            return Err(reason.into_error(synthesized, requested));
        }

        observer.on_stage(&PipelineStage::Concatenating);
        let sample_rate = segments[0].sample_rate;
        let config = self.config.clone();
        let raw = tokio::task::spawn_blocking(move || concatenate(segments, sample_rate, &config))
            .await
            .map_err(|e| PipelineError::WorkerPanicked(e.to_string()))??;

        let audio = raw.data.into_single_channel(0)?;
        let frames = audio.samples.len();
        let duration_secs = if raw.sample_rate > 0 {
            frames as f64 / raw.sample_rate as f64
        } else {
            0.0
        };

        let metadata = metadata(synthesized);
        info!(
            "Synthesized {:.1}s of audio from {} chunks in {}ms",
            duration_secs, synthesized, metadata.processing_time_ms
        );

        Ok(PipelineResult {
            audio,
            sample_rate: raw.sample_rate,
            duration_secs,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::MockSynthesizer;
    use base64::Engine;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        stages: Mutex<Vec<PipelineStage>>,
        chunks: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_stage(&self, stage: &PipelineStage) {
            self.stages.lock().unwrap().push(stage.clone());
        }

        fn on_chunk_synthesized(&self, index: usize, completed: usize, total: usize) {
            self.chunks.lock().unwrap().push((index, completed, total));
        }
    }

    fn pipeline(synth: MockSynthesizer, config: SynthesisConfig) -> Pipeline {
        Pipeline::new(Arc::new(synth), config).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let synth = Arc::new(MockSynthesizer::new(1000, 1));
        let config = SynthesisConfig::new().with_max_concurrency(0);
        assert!(matches!(
            Pipeline::new(synth, config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_sequence_on_success() {
        let observer = RecordingObserver::default();
        let p = pipeline(MockSynthesizer::new(1000, 10), SynthesisConfig::new().with_max_chunk_size(20));

        let result = p
            .run_with_observer("First sentence. Second sentence.", None, &RunControl::new(), &observer)
            .await
            .unwrap();

        assert_eq!(
            *observer.stages.lock().unwrap(),
            vec![
                PipelineStage::Chunking,
                PipelineStage::Synthesizing,
                PipelineStage::Concatenating,
                PipelineStage::Done,
            ]
        );
        assert_eq!(observer.chunks.lock().unwrap().len(), 2);
        assert_eq!(result.metadata.requested_chunks, 2);
        assert_eq!(result.metadata.synthesized_chunks, 2);
        assert_eq!(result.metadata.failed_chunks, 0);
        assert_eq!(result.audio.shape, vec![1, result.samples().len()]);
    }

    #[tokio::test]
    async fn test_empty_input_is_done_without_calls() {
        let observer = RecordingObserver::default();
        let synth = Arc::new(MockSynthesizer::new(1000, 10));
        let p = Pipeline::new(synth.clone(), SynthesisConfig::default()).unwrap();

        let result = p
            .run_with_observer("   \n\n ", None, &RunControl::new(), &observer)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.duration_secs, 0.0);
        assert_eq!(result.metadata.requested_chunks, 0);
        assert_eq!(synth.call_count(), 0);
        assert_eq!(
            *observer.stages.lock().unwrap(),
            vec![PipelineStage::Chunking, PipelineStage::Done]
        );
    }

    #[tokio::test]
    async fn test_failure_reports_failed_stage() {
        let observer = RecordingObserver::default();
        let p = pipeline(
            MockSynthesizer::new(1000, 10).failing_when(|_| true),
            SynthesisConfig::default(),
        );

        let err = p
            .run_with_observer("Hello.", None, &RunControl::new(), &observer)
            .await
            .unwrap_err();

        assert_eq!(err.failed_chunk(), Some(0));
        let stages = observer.stages.lock().unwrap();
        assert!(matches!(stages.last(), Some(PipelineStage::Failed(reason)) if reason.contains("chunk 0")));
    }

    #[tokio::test]
    async fn test_multichannel_single_chunk_is_reduced_to_one_channel() {
        let p = pipeline(
            MockSynthesizer::new(1000, 3).with_channels(2),
            SynthesisConfig::default(),
        );
        let result = p.run("Hi there.", None, &RunControl::new()).await.unwrap();
        assert_eq!(result.audio.shape, vec![1, 27]);
        assert_eq!(result.sample_rate, 1000);
        assert!((result.duration_secs - 0.027).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wav_export() {
        let p = pipeline(MockSynthesizer::new(8000, 5), SynthesisConfig::default());
        let result = p.run("Speak.", None, &RunControl::new()).await.unwrap();

        let bytes = result.to_wav_bytes().unwrap();
        let decoded = crate::audio::wav::decode_wav(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.data.samples, result.samples());

        let b64 = result.to_base64_wav().unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), bytes);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(
            PipelineStage::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }

    #[test]
    fn test_metadata_serializes() {
        let metadata = PipelineMetadata {
            requested_chunks: 3,
            synthesized_chunks: 3,
            failed_chunks: 0,
            total_characters: 2000,
            chunk_stats: ChunkStats::default(),
            processing_time_ms: 12,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["requested_chunks"], 3);
        assert_eq!(json["total_characters"], 2000);
        assert_eq!(json["chunk_stats"]["total_chunks"], 0);
    }
}
