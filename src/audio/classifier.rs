// src/audio/classifier.rs
//
// PCM chunk -> {SIREN, HORN, LOUD_NOISE, NONE}.
//
// Decision order per chunk:
//   1. siren band share over threshold AND the siren-band peak is sweeping
//      (wail/yelp) across recent sub-frames                      -> SIREN
//   2. horn band share over threshold                            -> HORN
//   3. raw RMS over the loud threshold                           -> LOUD_NOISE
//   4.                                                            -> NONE
//
// Siren outranks horn when both bands qualify. The sweep check is what
// separates a siren from a steady tone that happens to sit in its band,
// so the classifier keeps a short history of siren-band peak frequencies
// spanning the last few chunks. That history is per audio stream: one
// classifier per microphone.

use super::spectrum::{rms, SpectrumAnalyzer};
use crate::config::{check_count, check_range, check_unit, check_window};
use crate::error::{ConfigError, MalformedInput};
use crate::types::{AudioChunk, AudioEvent, AudioKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_seconds: f32,
    /// Chunks shorter than this share of the expected length classify as NONE
    pub min_chunk_fill: f32,
    pub loud_rms_threshold: f32,
    /// Below this RMS a chunk is treated as silence
    pub silence_rms: f32,
    pub horn_band_hz: (f32, f32),
    pub siren_band_hz: (f32, f32),
    pub horn_fraction_threshold: f32,
    pub siren_fraction_threshold: f32,
    /// How many chunks of siren-band peak history the sweep check looks at
    pub oscillation_window_chunks: usize,
    pub subframes_per_chunk: usize,
    /// Minimum peak-frequency excursion that counts as a sweep
    pub min_sweep_hz: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_seconds: 1.5,
            min_chunk_fill: 0.5,
            loud_rms_threshold: 0.25,
            silence_rms: 1e-4,
            horn_band_hz: (300.0, 700.0),
            siren_band_hz: (800.0, 1500.0),
            horn_fraction_threshold: 0.35,
            siren_fraction_threshold: 0.35,
            oscillation_window_chunks: 3,
            subframes_per_chunk: 6,
            min_sweep_hz: 150.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("audio.sample_rate", self.sample_rate as usize)?;
        check_window("audio.chunk_seconds", self.chunk_seconds as f64)?;
        check_unit("audio.min_chunk_fill", self.min_chunk_fill as f64)?;
        check_range("audio.loud_rms_threshold", self.loud_rms_threshold as f64, f64::MIN_POSITIVE, 1.0)?;
        check_range("audio.silence_rms", self.silence_rms as f64, 0.0, self.loud_rms_threshold as f64)?;
        check_unit("audio.horn_fraction_threshold", self.horn_fraction_threshold as f64)?;
        check_unit("audio.siren_fraction_threshold", self.siren_fraction_threshold as f64)?;
        check_count("audio.oscillation_window_chunks", self.oscillation_window_chunks)?;
        check_count("audio.subframes_per_chunk", self.subframes_per_chunk)?;
        check_window("audio.min_sweep_hz", self.min_sweep_hz as f64)?;

        let nyquist = self.sample_rate as f32 / 2.0;
        for (field, (low, high)) in [
            ("audio.horn_band_hz", self.horn_band_hz),
            ("audio.siren_band_hz", self.siren_band_hz),
        ] {
            if !(low.is_finite() && high.is_finite()) || low < 0.0 || low >= high {
                return Err(ConfigError::InvalidBand { field, low, high });
            }
            if high > nyquist {
                return Err(ConfigError::BandAboveNyquist {
                    field,
                    high,
                    nyquist,
                });
            }
        }
        Ok(())
    }

    pub fn expected_samples(&self) -> usize {
        (self.chunk_seconds * self.sample_rate as f32).round() as usize
    }
}

// ============================================================================
// SWEEP TRACKER
// ============================================================================

/// Rolling history of siren-band peak frequencies. Cleared as soon as a
/// chunk carries no siren-band energy, so a sweep must be continuous.
#[derive(Debug, Clone)]
struct SweepTracker {
    peaks: VecDeque<f32>,
    capacity: usize,
    min_sweep_hz: f32,
}

impl SweepTracker {
    fn new(capacity: usize, min_sweep_hz: f32) -> Self {
        Self {
            peaks: VecDeque::with_capacity(capacity),
            capacity,
            min_sweep_hz,
        }
    }

    fn observe(&mut self, chunk_peaks: &[f32]) -> bool {
        if chunk_peaks.is_empty() {
            self.peaks.clear();
            return false;
        }
        for &p in chunk_peaks {
            if self.peaks.len() >= self.capacity {
                self.peaks.pop_front();
            }
            self.peaks.push_back(p);
        }
        self.is_sweeping()
    }

    fn is_sweeping(&self) -> bool {
        if self.peaks.len() < 3 {
            return false;
        }
        let (lo, hi) = self
            .peaks
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        hi - lo >= self.min_sweep_hz
    }

    fn clear(&mut self) {
        self.peaks.clear();
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChunkAssessment {
    pub event: AudioEvent,
    pub malformed: Option<MalformedInput>,
    pub sweeping: bool,
    pub peak_concentration: f32,
}

pub struct AudioClassifier {
    config: AudioConfig,
    sweep: SweepTracker,
    analyzer: SpectrumAnalyzer,
}

impl AudioClassifier {
    pub fn new(config: AudioConfig) -> Self {
        let capacity = config.oscillation_window_chunks * config.subframes_per_chunk;
        let sweep = SweepTracker::new(capacity.max(1), config.min_sweep_hz);
        let analyzer = SpectrumAnalyzer::new(config.sample_rate);
        Self {
            config,
            sweep,
            analyzer,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.sweep.clear();
    }

    pub fn classify(&mut self, chunk: &AudioChunk) -> ChunkAssessment {
        if let Err(reason) = self.check_chunk(chunk) {
            debug!("Audio chunk at {:.2}s rejected: {}", chunk.timestamp, reason.as_str());
            return ChunkAssessment {
                event: none_event(chunk.timestamp, 0.0),
                malformed: Some(reason),
                sweeping: false,
                peak_concentration: 0.0,
            };
        }

        let samples = &chunk.samples;
        let energy = rms(samples);
        if energy < self.config.silence_rms {
            self.sweep.clear();
            return ChunkAssessment {
                event: none_event(chunk.timestamp, energy),
                malformed: None,
                sweeping: false,
                peak_concentration: 0.0,
            };
        }

        let spectrum = self.analyzer.analyze(samples);
        let (h_lo, h_hi) = self.config.horn_band_hz;
        let (s_lo, s_hi) = self.config.siren_band_hz;
        let horn_fraction = spectrum.band_fraction(h_lo, h_hi);
        let siren_fraction = spectrum.band_fraction(s_lo, s_hi);
        let peak_concentration = spectrum.peak_concentration();

        let siren_present = siren_fraction >= self.config.siren_fraction_threshold;
        let sweeping = if siren_present {
            let peaks = self.subframe_siren_peaks(samples);
            self.sweep.observe(&peaks)
        } else {
            self.sweep.observe(&[])
        };

        let kind = if siren_present && sweeping {
            AudioKind::Siren
        } else if horn_fraction >= self.config.horn_fraction_threshold {
            AudioKind::Horn
        } else if energy > self.config.loud_rms_threshold {
            AudioKind::LoudNoise
        } else {
            AudioKind::None
        };

        trace!(
            "Audio {:.2}s: rms={:.3} horn={:.2} siren={:.2} sweep={} peak={:.3} -> {}",
            chunk.timestamp,
            energy,
            horn_fraction,
            siren_fraction,
            sweeping,
            peak_concentration,
            kind.as_str()
        );

        ChunkAssessment {
            event: AudioEvent {
                kind,
                energy,
                horn_fraction,
                siren_fraction,
                timestamp: chunk.timestamp,
            },
            malformed: None,
            sweeping,
            peak_concentration,
        }
    }

    fn check_chunk(&self, chunk: &AudioChunk) -> Result<(), MalformedInput> {
        if chunk.sample_rate != self.config.sample_rate {
            return Err(MalformedInput::SampleRateMismatch);
        }
        let min_len = (self.config.expected_samples() as f32 * self.config.min_chunk_fill) as usize;
        if chunk.samples.len() < min_len.max(self.config.subframes_per_chunk * 2) {
            return Err(MalformedInput::ShortChunk);
        }
        if chunk.samples.iter().any(|s| !s.is_finite()) || !chunk.timestamp.is_finite() {
            return Err(MalformedInput::NonFinite);
        }
        Ok(())
    }

    /// Peak frequency inside the siren band for each sub-frame that
    /// itself carries siren-band energy.
    fn subframe_siren_peaks(&mut self, samples: &[f32]) -> Vec<f32> {
        let (s_lo, s_hi) = self.config.siren_band_hz;
        let threshold = self.config.siren_fraction_threshold;
        let size = samples.len() / self.config.subframes_per_chunk;
        let analyzer = &mut self.analyzer;

        samples
            .chunks_exact(size)
            .take(self.config.subframes_per_chunk)
            .filter_map(|sub| {
                let spectrum = analyzer.analyze(sub);
                if spectrum.band_fraction(s_lo, s_hi) >= threshold {
                    spectrum.peak_in_band(s_lo, s_hi)
                } else {
                    None
                }
            })
            .collect()
    }
}

fn none_event(timestamp: f64, energy: f32) -> AudioEvent {
    AudioEvent {
        kind: AudioKind::None,
        energy,
        horn_fraction: 0.0,
        siren_fraction: 0.0,
        timestamp,
    }
}
