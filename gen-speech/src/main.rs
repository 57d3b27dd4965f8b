//! gen-speech - Turn long text into a single speech WAV using a remote TTS service

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::GenSpeechConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tts_pipeline::audio::write_wav;
use tts_pipeline::{
    HttpSynthesizer, Pipeline, PipelineObserver, PipelineStage, RunControl, SynthesisConfig,
    VoiceReference,
};

#[derive(Parser, Debug)]
#[command(name = "gen-speech")]
#[command(about = "Turn long text into a single speech WAV using a remote TTS service", long_about = None)]
#[command(version)]
struct Args {
    /// Text file to read ("-" or omitted reads stdin)
    input: Option<PathBuf>,

    /// Output file path (default: <input-name>.wav, or speech.wav for stdin)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to voice reference audio for voice cloning
    #[arg(long)]
    voice: Option<PathBuf>,

    /// TTS generate-audio endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Maximum characters per chunk
    #[arg(long)]
    max_chunk_size: Option<usize>,

    /// Sentences repeated from the previous chunk
    #[arg(long)]
    overlap_sentences: Option<usize>,

    /// Silence between chunks, in seconds
    #[arg(long)]
    silence: Option<f32>,

    /// Fade in/out per chunk, in seconds
    #[arg(long)]
    fade: Option<f32>,

    /// Number of chunks synthesized at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print run metadata as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check that the TTS service is up
    Health,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the generate-audio endpoint
    SetEndpoint {
        /// Endpoint URL
        url: String,
    },
    /// Set the health check endpoint
    SetHealthEndpoint {
        /// Health check URL
        url: String,
    },
    /// Set default voice reference
    SetVoice {
        /// Path to voice reference audio
        path: PathBuf,
    },
    /// Set default maximum chunk size
    SetChunkSize {
        /// Characters per chunk
        value: usize,
    },
    /// Set default synthesis concurrency
    SetConcurrency {
        /// Chunks synthesized at once (1 for backends that cannot run in parallel)
        value: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = GenSpeechConfig::load().context("Failed to load configuration")?;

    // Handle subcommands
    match &args.command {
        Some(Commands::Config { action }) => {
            return handle_config_command(action, config);
        }
        Some(Commands::Health) => {
            return check_health(&args, &config).await;
        }
        None => {}
    }

    let text = read_input(args.input.as_deref()).await?;
    let pipeline_config = pipeline_config(&args, &config);
    let synthesizer = build_synthesizer(&args, &config)?;

    let voice_ref = args.voice.clone().or(config.voice_ref.clone());
    if let Some(ref path) = voice_ref {
        if !path.exists() {
            anyhow::bail!("Voice reference not found: {}", path.display());
        }
    }

    if args.debug {
        eprintln!("Endpoint: {}", synthesizer.endpoint());
        eprintln!("Voice ref: {:?}", voice_ref);
        eprintln!("Pipeline: {:?}", pipeline_config);
    }

    let (mut control, cancel) = RunControl::cancellable();
    if let Some(secs) = args.timeout {
        control = control.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            cancel.cancel();
        }
    });

    let pipeline = Pipeline::new(Arc::new(synthesizer), pipeline_config)?;
    let observer = ProgressObserver::new();
    let result = pipeline
        .run_with_observer(
            &text,
            voice_ref.map(VoiceReference::from_file),
            &control,
            &observer,
        )
        .await
        .context("Speech synthesis failed")?;

    if result.is_empty() {
        eprintln!("No input text; nothing to synthesize.");
    } else {
        let output_path = output_path(&args);
        write_wav(&output_path, result.samples(), result.sample_rate)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        eprintln!(
            "Output: {} ({:.1}s from {} chunks)",
            output_path.display(),
            result.duration_secs,
            result.metadata.synthesized_chunks
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.metadata)?);
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

/// Read the whole input text from a file, or stdin for "-" or no path.
async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Config file settings with command-line overrides applied.
fn pipeline_config(args: &Args, config: &GenSpeechConfig) -> SynthesisConfig {
    let mut pipeline = config.pipeline.clone();
    if let Some(value) = args.max_chunk_size {
        pipeline.max_chunk_size = value;
    }
    if let Some(value) = args.overlap_sentences {
        pipeline.overlap_sentences = value;
    }
    if let Some(value) = args.silence {
        pipeline.silence_duration = value;
    }
    if let Some(value) = args.fade {
        pipeline.fade_duration = value;
    }
    if let Some(value) = args.concurrency {
        pipeline.max_concurrency = value;
    }
    pipeline
}

fn build_synthesizer(args: &Args, config: &GenSpeechConfig) -> Result<HttpSynthesizer> {
    let endpoint = args
        .endpoint
        .as_deref()
        .or(config.endpoint.as_deref())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No TTS endpoint configured. Pass --endpoint or run 'gen-speech config set-endpoint <url>'."
            )
        })?;

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let mut synthesizer = HttpSynthesizer::new(endpoint, timeout)?;
    if let Some(ref health) = config.health_endpoint {
        synthesizer = synthesizer.with_health_endpoint(health)?;
    }
    Ok(synthesizer)
}

fn output_path(args: &Args) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    match args.input {
        Some(ref input) if input != Path::new("-") => input.with_extension("wav"),
        _ => PathBuf::from("speech.wav"),
    }
}

async fn check_health(args: &Args, config: &GenSpeechConfig) -> Result<()> {
    let synthesizer = build_synthesizer(args, config)?;
    let health = synthesizer
        .health()
        .await
        .with_context(|| format!("Health check failed for {}", synthesizer.health_endpoint()))?;

    println!(
        "API Status: {} | Model Loaded: {}",
        health.status, health.model_loaded
    );
    Ok(())
}

fn handle_config_command(action: &ConfigAction, mut config: GenSpeechConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration file: {}", GenSpeechConfig::config_path().display());
            println!();
            println!("Endpoint: {}", config.endpoint.as_deref().unwrap_or("(not set)"));
            println!(
                "Health endpoint: {}",
                config.health_endpoint.as_deref().unwrap_or("(derived from endpoint)")
            );
            println!(
                "Voice reference: {}",
                config
                    .voice_ref
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!("Request timeout: {}s", config.request_timeout_secs);
            println!("Max chunk size: {}", config.pipeline.max_chunk_size);
            println!("Overlap sentences: {}", config.pipeline.overlap_sentences);
            println!("Silence: {}s", config.pipeline.silence_duration);
            println!("Fade: {}s", config.pipeline.fade_duration);
            println!("Concurrency: {}", config.pipeline.max_concurrency);
        }
        ConfigAction::SetEndpoint { url } => {
            HttpSynthesizer::new(url, Duration::from_secs(config.request_timeout_secs))?;
            config.endpoint = Some(url.clone());
            config.save()?;
            println!("Endpoint set to: {}", url);
        }
        ConfigAction::SetHealthEndpoint { url } => {
            config.health_endpoint = Some(url.clone());
            config.save()?;
            println!("Health endpoint set to: {}", url);
        }
        ConfigAction::SetVoice { path } => {
            if !path.exists() {
                anyhow::bail!("Voice file not found: {}", path.display());
            }
            let abs_path = path.canonicalize()?;
            config.voice_ref = Some(abs_path.clone());
            config.save()?;
            println!("Voice reference set to: {}", abs_path.display());
        }
        ConfigAction::SetChunkSize { value } => {
            config.pipeline.max_chunk_size = *value;
            config.pipeline.validate()?;
            config.save()?;
            println!("Max chunk size set to: {}", value);
        }
        ConfigAction::SetConcurrency { value } => {
            config.pipeline.max_concurrency = *value;
            config.pipeline.validate()?;
            config.save()?;
            println!("Concurrency set to: {}", value);
        }
    }

    Ok(())
}

/// Shows chunk progress on stderr.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl PipelineObserver for ProgressObserver {
    fn on_stage(&self, stage: &PipelineStage) {
        match stage {
            PipelineStage::Chunking => {}
            PipelineStage::Synthesizing | PipelineStage::Concatenating => {
                self.bar.set_message(stage.to_string());
            }
            PipelineStage::Done => self.bar.finish_and_clear(),
            PipelineStage::Failed(_) => self.bar.abandon(),
        }
    }

    fn on_chunk_synthesized(&self, _index: usize, completed: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("gen-speech").chain(argv.iter().copied()))
    }

    #[test]
    fn test_output_path_defaults() {
        assert_eq!(output_path(&args(&["notes.txt"])), PathBuf::from("notes.wav"));
        assert_eq!(output_path(&args(&["-"])), PathBuf::from("speech.wav"));
        assert_eq!(output_path(&args(&[])), PathBuf::from("speech.wav"));
        assert_eq!(
            output_path(&args(&["notes.txt", "-o", "out/talk.wav"])),
            PathBuf::from("out/talk.wav")
        );
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = GenSpeechConfig::default();
        config.pipeline.max_chunk_size = 500;
        config.pipeline.max_concurrency = 2;

        let merged = pipeline_config(
            &args(&["in.txt", "--max-chunk-size", "300", "--silence", "0.25"]),
            &config,
        );
        assert_eq!(merged.max_chunk_size, 300);
        assert_eq!(merged.silence_duration, 0.25);
        assert_eq!(merged.max_concurrency, 2);

        let untouched = pipeline_config(&args(&["in.txt"]), &config);
        assert_eq!(untouched, config.pipeline);
    }

    #[test]
    fn test_endpoint_is_required() {
        let err = build_synthesizer(&args(&["in.txt"]), &GenSpeechConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No TTS endpoint"));

        let synth = build_synthesizer(
            &args(&["in.txt", "--endpoint", "http://localhost:8000/generate_audio"]),
            &GenSpeechConfig::default(),
        )
        .unwrap();
        assert_eq!(synth.health_endpoint(), "http://localhost:8000/health");
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "Hello there.").unwrap();
        assert_eq!(read_input(Some(&path)).await.unwrap(), "Hello there.");
        assert!(read_input(Some(&dir.path().join("missing.txt"))).await.is_err());
    }
}
