// src/audio/mod.rs
//
// Microphone side of the core:
//   PCM chunk -> energy spectrum -> band shares + sweep check -> AudioEvent

pub mod classifier;
pub mod spectrum;

pub use classifier::{AudioClassifier, AudioConfig, ChunkAssessment};
pub use spectrum::{rms, EnergySpectrum, SpectrumAnalyzer};
