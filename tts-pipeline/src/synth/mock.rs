//! Mock synthesizer for testing
//!
//! Produces a deterministic tone whose length is proportional to the text,
//! with configurable latency and failures, and records how it was called.

use async_trait::async_trait;
use std::f32::consts::PI;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Synthesizer, VoiceReference};
use crate::audio::{AudioData, RawAudio};
use crate::error::SynthesisError;

type LatencyFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;
type FailureFn = Box<dyn Fn(&str) -> bool + Send + Sync>;

const TONE_HZ: f32 = 220.0;
const TONE_AMPLITUDE: f32 = 0.5;

pub struct MockSynthesizer {
    sample_rate: u32,
    samples_per_char: usize,
    /// Number of identical channels; above 1 the output is `[frames, channels]`
    channels: usize,
    latency: Option<LatencyFn>,
    fail_when: Option<FailureFn>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    voices: Mutex<Vec<Option<VoiceReference>>>,
}

impl MockSynthesizer {
    /// A synthesizer that answers immediately with `samples_per_char` samples
    /// per input character.
    pub fn new(sample_rate: u32, samples_per_char: usize) -> Self {
        Self {
            sample_rate,
            samples_per_char,
            channels: 1,
            latency: None,
            fail_when: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Delay each call by an amount derived from its text.
    pub fn with_latency(mut self, latency: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Some(Box::new(latency));
        self
    }

    /// Delay every call by the same amount.
    pub fn with_fixed_latency(self, latency: Duration) -> Self {
        self.with_latency(move |_| latency)
    }

    /// Fail any call whose text matches `predicate`.
    pub fn failing_when(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Return interleaved multi-channel audio.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Frames produced for `text`.
    pub fn frames_for(&self, text: &str) -> usize {
        text.chars().count() * self.samples_per_char
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Texts received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Voice passed with each call, in call order.
    pub fn voices_seen(&self) -> Vec<Option<VoiceReference>> {
        self.voices.lock().unwrap().clone()
    }

    fn tone(&self, text: &str) -> RawAudio {
        let frames = self.frames_for(text);
        let rate = self.sample_rate.max(1) as f32;
        let mono = (0..frames).map(|i| TONE_AMPLITUDE * (2.0 * PI * TONE_HZ * i as f32 / rate).sin());

        if self.channels == 1 {
            return RawAudio::mono(mono.collect(), self.sample_rate);
        }

        let samples = mono
            .flat_map(|s| std::iter::repeat_n(s, self.channels))
            .collect();
        RawAudio {
            data: AudioData::with_shape(samples, vec![frames, self.channels]),
            sample_rate: self.sample_rate,
        }
    }
}

/// Tracks concurrent calls; decrements on drop so aborted calls are counted out.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceReference>,
    ) -> Result<RawAudio, SynthesisError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(text.to_string());
        self.voices.lock().unwrap().push(voice.cloned());

        let _guard = InFlightGuard::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(latency) = &self.latency {
            let delay = latency(text);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(fail_when) = &self.fail_when {
            if fail_when(text) {
                let preview: String = text.chars().take(30).collect();
                return Err(SynthesisError::Backend(format!(
                    "mock failure for \"{}\"",
                    preview
                )));
            }
        }

        Ok(self.tone(text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_length_follows_text() {
        let synth = MockSynthesizer::new(8000, 10);
        let raw = synth.synthesize("hello", None).await.unwrap();
        assert_eq!(raw.sample_rate, 8000);
        assert_eq!(raw.data.samples.len(), 50);
        assert_eq!(raw.data.shape, vec![50]);
        assert!(raw.data.samples.iter().all(|s| s.abs() <= TONE_AMPLITUDE));
        assert_eq!(synth.call_count(), 1);
        assert_eq!(synth.calls(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let synth = MockSynthesizer::new(8000, 4);
        let a = synth.synthesize("same text", None).await.unwrap();
        let b = synth.synthesize("same text", None).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_failure_predicate() {
        let synth = MockSynthesizer::new(8000, 1).failing_when(|t| t.contains("boom"));
        assert!(synth.synthesize("fine", None).await.is_ok());

        let err = synth.synthesize("this goes boom", None).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Backend(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(synth.call_count(), 2);
        assert_eq!(synth.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_multichannel_output_is_interleaved() {
        let synth = MockSynthesizer::new(8000, 2).with_channels(2);
        let raw = synth.synthesize("abc", None).await.unwrap();
        assert_eq!(raw.data.shape, vec![6, 2]);
        assert_eq!(raw.data.samples[2], raw.data.samples[3]);
    }

    #[tokio::test]
    async fn test_records_voice() {
        let synth = MockSynthesizer::new(8000, 1);
        let voice = VoiceReference::Bytes(vec![9, 9]);
        synth.synthesize("a", Some(&voice)).await.unwrap();
        synth.synthesize("b", None).await.unwrap();
        assert_eq!(synth.voices_seen(), vec![Some(voice), None]);
    }

    #[tokio::test]
    async fn test_peak_in_flight_counts_overlapping_calls() {
        let synth = MockSynthesizer::new(8000, 1).with_fixed_latency(Duration::from_millis(20));
        let (a, b) = tokio::join!(synth.synthesize("a", None), synth.synthesize("b", None));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(synth.peak_in_flight(), 2);
        assert_eq!(synth.in_flight(), 0);
    }
}
