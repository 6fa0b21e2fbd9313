// src/audio/spectrum.rs
//
// Energy spectrum of a PCM buffer. DC removed, Hann windowed to keep tone
// leakage out of neighbouring bands, zero padded to the next power of two
// and run through a planned rustfft forward transform.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// Plans one forward FFT per buffer length and reuses it. A chunk and its
/// sub-frames each have a fixed length, so a classifier ends up holding
/// two or three plans.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    plans: HashMap<usize, Arc<dyn Fft<f64>>>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            plans: HashMap::new(),
        }
    }

    pub fn planned_sizes(&self) -> usize {
        self.plans.len()
    }

    pub fn analyze(&mut self, samples: &[f32]) -> EnergySpectrum {
        let n = samples.len().max(2).next_power_of_two();
        let fft = self.plan(n);

        let mean = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
        };
        let len = samples.len();
        let mut buffer = vec![Complex::new(0.0f64, 0.0); n];
        for (i, &s) in samples.iter().enumerate() {
            buffer[i].re = (s as f64 - mean) * hann(i, len);
        }

        fft.process(&mut buffer);

        EnergySpectrum {
            bins: buffer[..=n / 2].iter().map(|c| c.norm_sqr()).collect(),
            resolution: self.sample_rate as f64 / n as f64,
        }
    }

    fn plan(&mut self, n: usize) -> Arc<dyn Fft<f64>> {
        let fft = self
            .plans
            .entry(n)
            .or_insert_with(|| FftPlanner::new().plan_fft_forward(n));
        Arc::clone(fft)
    }
}

/// One-sided energy spectrum (|X[k]|^2 for k in 0..=n/2).
#[derive(Debug, Clone)]
pub struct EnergySpectrum {
    bins: Vec<f64>,
    /// Hz per bin
    resolution: f64,
}

impl EnergySpectrum {
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Total energy excluding the DC bin.
    pub fn total_energy(&self) -> f64 {
        self.bins.iter().skip(1).sum()
    }

    /// Energy in bins whose centre frequency falls within [low, high] Hz.
    pub fn band_energy(&self, low: f32, high: f32) -> f64 {
        let (lo, hi) = self.bin_range(low, high);
        if lo > hi {
            return 0.0;
        }
        self.bins[lo..=hi].iter().sum()
    }

    /// Band energy as a share of total energy, 0 for a silent buffer.
    pub fn band_fraction(&self, low: f32, high: f32) -> f32 {
        let total = self.total_energy();
        if total <= f64::EPSILON {
            return 0.0;
        }
        (self.band_energy(low, high) / total) as f32
    }

    /// Frequency of the strongest bin inside [low, high] Hz.
    pub fn peak_in_band(&self, low: f32, high: f32) -> Option<f32> {
        let (lo, hi) = self.bin_range(low, high);
        if lo > hi {
            return None;
        }
        (lo..=hi)
            .max_by(|&a, &b| self.bins[a].total_cmp(&self.bins[b]))
            .filter(|&k| self.bins[k] > 0.0)
            .map(|k| (k as f64 * self.resolution) as f32)
    }

    /// Share of total energy held by the single strongest bin. Broadband
    /// noise scores near zero, a pure tone scores high.
    pub fn peak_concentration(&self) -> f32 {
        let total = self.total_energy();
        if total <= f64::EPSILON {
            return 0.0;
        }
        let peak = self.bins.iter().skip(1).cloned().fold(0.0f64, f64::max);
        (peak / total) as f32
    }

    fn bin_range(&self, low: f32, high: f32) -> (usize, usize) {
        let last = self.bins.len() - 1;
        let lo = ((low as f64 / self.resolution).ceil() as usize).max(1);
        let hi = ((high as f64 / self.resolution).floor() as usize).min(last);
        (lo, hi)
    }
}

/// Root mean square of the raw waveform.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

fn hann(i: usize, len: usize) -> f64 {
    if len < 2 {
        return 1.0;
    }
    0.5 - 0.5 * (2.0 * PI * i as f64 / (len - 1) as f64).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amplitude: f32, seconds: f32, rate: u32) -> Vec<f32> {
        let n = (seconds * rate as f32) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_rms_of_sine() {
        let s = tone(440.0, 1.0, 1.0, 44100);
        assert!((rms(&s) - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_pure_tone_lands_in_its_band() {
        let spectrum = SpectrumAnalyzer::new(44100).analyze(&tone(500.0, 0.5, 0.5, 44100));
        assert!(spectrum.band_fraction(300.0, 700.0) > 0.95);
        assert!(spectrum.band_fraction(800.0, 1500.0) < 0.01);
        let peak = spectrum.peak_in_band(300.0, 700.0).unwrap();
        assert!((peak - 500.0).abs() < 2.0 * spectrum.resolution() as f32);
        assert!(spectrum.peak_concentration() > 0.1);
    }

    #[test]
    fn test_two_tones_split_energy() {
        let a = tone(500.0, 0.3, 0.5, 44100);
        let b = tone(1100.0, 0.3, 0.5, 44100);
        let mix: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let spectrum = SpectrumAnalyzer::new(44100).analyze(&mix);
        let horn = spectrum.band_fraction(300.0, 700.0);
        let siren = spectrum.band_fraction(800.0, 1500.0);
        assert!((horn - 0.5).abs() < 0.05);
        assert!((siren - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_silence_is_zero_energy() {
        let spectrum = SpectrumAnalyzer::new(44100).analyze(&vec![0.0; 4096]);
        assert_eq!(spectrum.band_fraction(300.0, 700.0), 0.0);
        assert_eq!(spectrum.peak_in_band(300.0, 700.0), None);
        assert_eq!(spectrum.peak_concentration(), 0.0);
    }

    #[test]
    fn test_plans_are_reused_per_length() {
        let mut analyzer = SpectrumAnalyzer::new(44100);
        let chunk = tone(500.0, 0.5, 0.5, 44100);
        let first = analyzer.analyze(&chunk);
        let second = analyzer.analyze(&chunk);
        analyzer.analyze(&chunk[..chunk.len() / 6]);
        assert_eq!(analyzer.planned_sizes(), 2);
        assert_eq!(first.band_energy(300.0, 700.0), second.band_energy(300.0, 700.0));
    }

    #[test]
    fn test_dc_offset_is_removed() {
        let shifted: Vec<f32> = tone(1000.0, 0.2, 0.5, 44100).iter().map(|s| s + 0.5).collect();
        let spectrum = SpectrumAnalyzer::new(44100).analyze(&shifted);
        assert!(spectrum.band_fraction(800.0, 1500.0) > 0.95);
    }
}
