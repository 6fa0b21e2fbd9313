// src/danger.rs
//
// Pure lookup from a proximity band or audio kind to a danger level.
//
//   VERY_CLOSE / SIREN      -> CRITICAL
//   CLOSE      / HORN       -> HIGH
//   NEAR       / LOUD_NOISE -> MEDIUM
//   FAR        / NONE       -> LOW   (terminal, never becomes an alert)

use crate::types::{AudioKind, DangerLevel, DistanceBand};

pub trait DangerSignal: Copy {
    fn danger_level(self) -> DangerLevel;

    /// FAR and NONE are "no hazard" and must stay out of fusion.
    fn is_hazard(self) -> bool;
}

impl DangerSignal for DistanceBand {
    fn danger_level(self) -> DangerLevel {
        match self {
            DistanceBand::VeryClose => DangerLevel::Critical,
            DistanceBand::Close => DangerLevel::High,
            DistanceBand::Near => DangerLevel::Medium,
            DistanceBand::Far => DangerLevel::Low,
        }
    }

    fn is_hazard(self) -> bool {
        self != DistanceBand::Far
    }
}

impl DangerSignal for AudioKind {
    fn danger_level(self) -> DangerLevel {
        match self {
            AudioKind::Siren => DangerLevel::Critical,
            AudioKind::Horn => DangerLevel::High,
            AudioKind::LoudNoise => DangerLevel::Medium,
            AudioKind::None => DangerLevel::Low,
        }
    }

    fn is_hazard(self) -> bool {
        self != AudioKind::None
    }
}

/// The level to feed into fusion, or None when the signal is not a hazard.
pub fn classify<S: DangerSignal>(signal: S) -> Option<DangerLevel> {
    signal.is_hazard().then(|| signal.danger_level())
}
