//! Zero-phase Butterworth high-pass used to clean up stitched audio.
//!
//! The filter is a cascade of second-order sections run forward and then
//! backward over an odd-extended copy of the signal, so the result has no
//! phase shift and the magnitude response is applied twice.

use core::f64::consts::PI;

/// Cutoff of the clean-up filter in Hz.
pub const HIGH_PASS_CUTOFF_HZ: f64 = 80.0;

/// Rate the cutoff is normalized against, independent of the actual signal rate.
pub const REFERENCE_RATE_HZ: f64 = 22050.0;

const ORDER: usize = 4;

/// Samples of odd extension added to each edge before filtering.
const PAD_LEN: usize = 3 * (ORDER + 1);

/// Direct-form II transposed biquad with a0 normalized to 1.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Bilinear-transform high-pass section at angular frequency `w0`
    /// (radians per sample) with quality factor `q`.
    fn high_pass(w0: f64, q: f64) -> Self {
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Delay-line state matching the steady-state response to a unit step.
    fn step_state(&self) -> [f64; 2] {
        let y = self.dc_gain();
        [y - self.b0, self.b2 - self.a2 * y]
    }

    fn run(&self, signal: &mut [f64], state: [f64; 2]) {
        let [mut z1, mut z2] = state;
        for s in signal.iter_mut() {
            let x = *s;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *s = y;
        }
    }
}

/// Fourth-order Butterworth high-pass filter.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    sections: Vec<Biquad>,
}

impl HighPassFilter {
    /// Design a filter for a cutoff given as a fraction of the Nyquist rate.
    ///
    /// Returns `None` unless `0 < normalized_cutoff < 1`.
    pub fn butterworth(normalized_cutoff: f64) -> Option<Self> {
        if !(normalized_cutoff > 0.0 && normalized_cutoff < 1.0) {
            return None;
        }

        let w0 = PI * normalized_cutoff;
        let sections = (0..ORDER / 2)
            .map(|k| {
                // Butterworth pole pair k
                let angle = (2 * k + 1) as f64 * PI / (2 * ORDER) as f64;
                Biquad::high_pass(w0, 1.0 / (2.0 * angle.cos()))
            })
            .collect();

        Some(Self { sections })
    }

    /// The 80 Hz clean-up filter, normalized against a 22050 Hz reference.
    pub fn speech_cleanup() -> Option<Self> {
        Self::butterworth(HIGH_PASS_CUTOFF_HZ / (REFERENCE_RATE_HZ / 2.0))
    }

    /// Run the filter forward and backward over `signal`.
    ///
    /// Returns `None` when the signal is too short to pad.
    pub fn filtfilt(&self, signal: &[f32]) -> Option<Vec<f32>> {
        let n = signal.len();
        if n <= PAD_LEN {
            return None;
        }

        let mut buf = odd_extend(signal, PAD_LEN);
        self.run_cascade(&mut buf);
        buf.reverse();
        self.run_cascade(&mut buf);
        buf.reverse();

        let filtered: Vec<f32> = buf[PAD_LEN..PAD_LEN + n].iter().map(|&s| s as f32).collect();
        if filtered.iter().all(|s| s.is_finite()) {
            Some(filtered)
        } else {
            None
        }
    }

    fn run_cascade(&self, buf: &mut [f64]) {
        let x0 = buf.first().copied().unwrap_or(0.0);
        let mut scale = 1.0;
        for section in &self.sections {
            let [z1, z2] = section.step_state();
            section.run(buf, [z1 * scale * x0, z2 * scale * x0]);
            scale *= section.dc_gain();
        }
    }
}

/// Reflect `pad` samples about each endpoint with odd symmetry.
fn odd_extend(signal: &[f32], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0] as f64;
    let last = signal[n - 1] as f64;

    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i] as f64));
    ext.extend(signal.iter().map(|&s| s as f64));
    ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i] as f64));
    ext
}

/// Remove DC offset and low-frequency join artifacts.
///
/// Signals too short for the filter are returned unchanged.
pub fn remove_low_frequency(samples: Vec<f32>) -> Vec<f32> {
    let filtered = HighPassFilter::speech_cleanup().and_then(|filter| filter.filtfilt(&samples));
    match filtered {
        Some(filtered) => filtered,
        None => {
            log::debug!(
                "High-pass clean-up skipped for {} samples; returning unfiltered audio",
                samples.len()
            );
            samples
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, rate: f64, len: usize, amplitude: f64) -> Vec<f32> {
        (0..len)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / rate).sin()) as f32)
            .collect()
    }

    #[test]
    fn test_design_rejects_out_of_range_cutoff() {
        assert!(HighPassFilter::butterworth(0.0).is_none());
        assert!(HighPassFilter::butterworth(1.0).is_none());
        assert!(HighPassFilter::butterworth(f64::NAN).is_none());
        assert!(HighPassFilter::butterworth(0.5).is_some());
    }

    #[test]
    fn test_sections_block_dc() {
        let filter = HighPassFilter::speech_cleanup().unwrap();
        assert_eq!(filter.sections.len(), 2);
        for section in &filter.sections {
            assert!(section.dc_gain().abs() < 1e-12);
        }
    }

    #[test]
    fn test_odd_extend() {
        let ext = odd_extend(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn test_constant_offset_is_removed() {
        let signal = vec![0.5f32; 2000];
        let filtered = HighPassFilter::speech_cleanup().unwrap().filtfilt(&signal).unwrap();
        assert_eq!(filtered.len(), signal.len());
        assert!(filtered.iter().all(|s| s.abs() < 1e-4), "DC leaked through");
    }

    #[test]
    fn test_speech_band_passes_without_phase_shift() {
        let signal = sine(1000.0, 22050.0, 8820, 0.8);
        let filtered = HighPassFilter::speech_cleanup().unwrap().filtfilt(&signal).unwrap();
        for i in 2205..6615 {
            assert!(
                (filtered[i] - signal[i]).abs() < 0.01,
                "sample {} differs: {} vs {}",
                i,
                filtered[i],
                signal[i]
            );
        }
    }

    #[test]
    fn test_rumble_is_attenuated() {
        let signal = sine(20.0, 22050.0, 22050, 0.8);
        let filtered = HighPassFilter::speech_cleanup().unwrap().filtfilt(&signal).unwrap();
        let peak = filtered[5000..17000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak < 0.01, "20 Hz peak after filtering: {}", peak);
    }

    #[test]
    fn test_short_signal_falls_back_to_input() {
        let signal = vec![0.1f32, -0.2, 0.3];
        assert!(HighPassFilter::speech_cleanup().unwrap().filtfilt(&signal).is_none());
        assert_eq!(remove_low_frequency(signal.clone()), signal);
    }
}
