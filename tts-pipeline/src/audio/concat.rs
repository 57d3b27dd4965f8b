//! Stitching per-chunk audio into one waveform.

use log::{debug, warn};

use super::filter::remove_low_frequency;
use super::{AudioSegment, RawAudio};
use crate::config::SynthesisConfig;
use crate::error::{PipelineError, Result};

/// Peak level after normalization, leaving 5% headroom.
pub const PEAK_TARGET: f32 = 0.95;

/// Concatenate synthesized segments in the order given.
///
/// A single segment is returned as-is. Otherwise each segment is reduced to
/// mono, peak-normalized and faded, then joined with silence; the result is
/// normalized again and high-pass filtered.
pub fn concatenate(
    segments: Vec<AudioSegment>,
    sample_rate: u32,
    config: &SynthesisConfig,
) -> Result<RawAudio> {
    config.validate()?;
    if segments.is_empty() {
        return Err(PipelineError::NoSegments);
    }

    if segments.len() == 1 {
        let segment = segments.into_iter().next().ok_or(PipelineError::NoSegments)?;
        return Ok(RawAudio {
            data: segment.data,
            sample_rate: segment.sample_rate,
        });
    }

    let fade_len = config.fade_samples(sample_rate);
    let mut prepared = Vec::with_capacity(segments.len());
    let mut dropped = 0;

    for segment in segments {
        let index = segment.index;
        if segment.sample_rate != sample_rate {
            warn!(
                "Segment {} is {} Hz but output is {} Hz; joining without resampling",
                index, segment.sample_rate, sample_rate
            );
        }

        let mut samples = segment.data.into_mono(index)?;
        if samples.is_empty() {
            warn!("Dropping empty audio segment {}", index);
            dropped += 1;
            continue;
        }

        debug!(
            "Segment {}: {} samples ({:.2}s)",
            index,
            samples.len(),
            samples.len() as f64 / sample_rate as f64
        );

        peak_normalize(&mut samples);
        apply_fade(&mut samples, fade_len);
        prepared.push(samples);
    }

    if prepared.is_empty() {
        return Err(PipelineError::AllSegmentsEmpty { dropped });
    }

    let silence_len = config.silence_samples(sample_rate);
    debug!(
        "Joining {} segments with {} samples of silence between each",
        prepared.len(),
        silence_len
    );

    let mut joined = join_with_silence(&prepared, silence_len);
    peak_normalize(&mut joined);

    Ok(RawAudio::mono(remove_low_frequency(joined), sample_rate))
}

/// Interleave segments with `silence_len` zero samples between neighbours.
fn join_with_silence(segments: &[Vec<f32>], silence_len: usize) -> Vec<f32> {
    let gaps = segments.len().saturating_sub(1);
    let total = segments
        .iter()
        .map(Vec::len)
        .fold(silence_len.saturating_mul(gaps), usize::saturating_add);

    let mut joined = Vec::with_capacity(total);
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            joined.resize(joined.len() + silence_len, 0.0);
        }
        joined.extend_from_slice(segment);
    }
    joined
}

/// Scale samples so the loudest one reaches [`PEAK_TARGET`].
///
/// Silent input is left untouched.
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return;
    }

    let gain = PEAK_TARGET / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Apply a linear fade-in and fade-out of `fade_len` samples each.
///
/// Segments shorter than two fade windows are left untouched.
pub fn apply_fade(samples: &mut [f32], fade_len: usize) {
    let n = samples.len();
    if fade_len == 0 || fade_len > n / 2 {
        return;
    }

    for i in 0..fade_len {
        let gain = ramp(i, fade_len);
        samples[i] *= gain;
        samples[n - 1 - i] *= gain;
    }
}

/// Evenly spaced gain from 0 to 1 inclusive over `len` points.
fn ramp(i: usize, len: usize) -> f32 {
    if len <= 1 {
        return 0.0;
    }
    i as f32 / (len - 1) as f32
}
