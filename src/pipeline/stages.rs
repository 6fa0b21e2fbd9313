// src/pipeline/stages.rs
//
// Per-source classification stages. Each turns one frame or one chunk
// into a `SourceReport`: the hazards to hand to fusion plus the drop
// counts the metrics want. Nothing here touches fusion state, so stages
// can run inside their producer tasks.
//
//   FrameDetections -> normalize -> estimate band -> danger -> collapse per key
//   AudioChunk      -> spectral classify -> danger

use crate::audio::{AudioClassifier, AudioConfig};
use crate::danger;
use crate::detection::{DetectionNormalizer, DistanceCalibration, DistanceEstimator, NormalizerConfig};
use crate::error::MalformedInput;
use crate::fusion::Hazard;
use crate::types::{AlertSource, AudioChunk, AudioKind, DistanceBand, FrameDetections};
use tracing::debug;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub observations: u32,
    pub far: u32,
    pub malformed: u32,
    pub low_confidence: u32,
    pub unknown_class: u32,
    pub has_motion: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStats {
    Frame(FrameStats),
    Chunk {
        kind: AudioKind,
        malformed: Option<MalformedInput>,
    },
}

/// One frame's or one chunk's contribution, applied to fusion atomically.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: AlertSource,
    pub timestamp: f64,
    pub hazards: Vec<Hazard>,
    pub stats: StageStats,
}

// ============================================================================
// CAMERA
// ============================================================================

#[derive(Debug, Clone)]
pub struct CameraStage {
    normalizer: DetectionNormalizer,
    estimator: DistanceEstimator,
}

impl CameraStage {
    pub fn new(detection: NormalizerConfig, calibration: DistanceCalibration) -> Self {
        Self {
            normalizer: DetectionNormalizer::new(detection),
            estimator: DistanceEstimator::new(calibration),
        }
    }

    pub fn process(&self, frame: &FrameDetections) -> SourceReport {
        let normalized = self.normalizer.normalize(frame);
        let mut stats = FrameStats {
            observations: normalized.observations.len() as u32,
            malformed: normalized.malformed_count(),
            low_confidence: normalized.low_confidence,
            unknown_class: normalized.unknown_class,
            has_motion: normalized.has_motion,
            ..FrameStats::default()
        };

        // Several boxes landing on one key in the same frame are one
        // occurrence, at the most severe level among them.
        let mut hazards: Vec<Hazard> = Vec::new();
        for obs in &normalized.observations {
            let band = self.estimator.estimate(obs.object_class, obs.bbox.area());
            let Some(level) = danger::classify(band) else {
                debug_assert_eq!(band, DistanceBand::Far);
                stats.far += 1;
                continue;
            };

            let hazard = Hazard::from_observation(obs, level);
            match hazards.iter_mut().find(|h| h.key == hazard.key) {
                Some(existing) => existing.level = existing.level.max(level),
                None => hazards.push(hazard),
            }
        }

        if !hazards.is_empty() {
            debug!(
                "{} frame {:.3}s: {} observations -> {} hazards",
                frame.camera.as_str(),
                frame.timestamp,
                stats.observations,
                hazards.len()
            );
        }

        SourceReport {
            source: frame.camera.into(),
            timestamp: frame.timestamp,
            hazards,
            stats: StageStats::Frame(stats),
        }
    }
}

// ============================================================================
// AUDIO
// ============================================================================

/// Holds the siren sweep history, so one instance per audio stream.
pub struct AudioStage {
    classifier: AudioClassifier,
}

impl AudioStage {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            classifier: AudioClassifier::new(config),
        }
    }

    pub fn process(&mut self, chunk: &AudioChunk) -> SourceReport {
        let assessment = self.classifier.classify(chunk);
        let kind = assessment.event.kind;

        let hazards = danger::classify(kind)
            .map(|level| vec![Hazard::from_sound(kind, level, chunk.timestamp)])
            .unwrap_or_default();

        SourceReport {
            source: AlertSource::Audio,
            timestamp: chunk.timestamp,
            hazards,
            stats: StageStats::Chunk {
                kind,
                malformed: assessment.malformed,
            },
        }
    }
}
