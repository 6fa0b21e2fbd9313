// src/types.rs

use crate::audio::AudioConfig;
use crate::detection::{DistanceCalibration, NormalizerConfig};
use crate::fusion::{FusionConfig, LedgerConfig};
use crate::pipeline::RuntimeConfig;
use crate::replay::ReplayConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: NormalizerConfig,
    pub distance: DistanceCalibration,
    pub audio: AudioConfig,
    pub fusion: FusionConfig,
    pub ledger: LedgerConfig,
    pub runtime: RuntimeConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "cyclesafe=info".to_string(),
        }
    }
}

// ============================================================================
// SOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraPosition {
    Front,
    Rear,
}

impl CameraPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "FRONT",
            Self::Rear => "REAR",
        }
    }
}

/// Where an alert came from. Cameras and the microphone are the only producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSource {
    Front,
    Rear,
    Audio,
}

impl AlertSource {
    pub const ALL: [AlertSource; 3] = [AlertSource::Front, AlertSource::Rear, AlertSource::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "FRONT",
            Self::Rear => "REAR",
            Self::Audio => "AUDIO",
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, Self::Front | Self::Rear)
    }
}

impl From<CameraPosition> for AlertSource {
    fn from(camera: CameraPosition) -> Self {
        match camera {
            CameraPosition::Front => AlertSource::Front,
            CameraPosition::Rear => AlertSource::Rear,
        }
    }
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OBJECTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Bicycle,
    Person,
    /// Generic "vehicle" from detectors that do not resolve the type (cascade fallback)
    Unknown,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 7] = [
        ObjectClass::Car,
        ObjectClass::Truck,
        ObjectClass::Bus,
        ObjectClass::Motorcycle,
        ObjectClass::Bicycle,
        ObjectClass::Person,
        ObjectClass::Unknown,
    ];

    /// Map a detector label onto the taxonomy. Labels outside the
    /// vocabulary return None and are dropped by the normalizer.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "car" => Some(Self::Car),
            "truck" => Some(Self::Truck),
            "bus" => Some(Self::Bus),
            "motorcycle" | "motorbike" => Some(Self::Motorcycle),
            "bicycle" => Some(Self::Bicycle),
            "person" => Some(Self::Person),
            "vehicle" | "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Bus => "bus",
            Self::Motorcycle => "motorcycle",
            Self::Bicycle => "bicycle",
            Self::Person => "person",
            Self::Unknown => "unknown",
        }
    }

    /// Motorised traffic, the only classes a siren can corroborate.
    pub fn is_motor_vehicle(&self) -> bool {
        matches!(
            self,
            Self::Car | Self::Truck | Self::Bus | Self::Motorcycle | Self::Unknown
        )
    }
}

/// Bounding box in normalized [0,1] x [0,1] frame coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedBox {
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w * 0.5
    }
}

/// Horizontal third of the frame a hazard sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LateralZone {
    Left,
    Center,
    Right,
}

impl LateralZone {
    pub fn from_center_x(cx: f32) -> Self {
        if cx < 1.0 / 3.0 {
            Self::Left
        } else if cx < 2.0 / 3.0 {
            Self::Center
        } else {
            Self::Right
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Center => "CENTER",
            Self::Right => "RIGHT",
        }
    }
}

/// One normalized detection from one camera frame. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub source: CameraPosition,
    pub object_class: ObjectClass,
    pub bbox: NormalizedBox,
    pub confidence: f32,
    /// Seconds on the source's stream clock
    pub timestamp: f64,
}

impl Observation {
    pub fn lateral_zone(&self) -> LateralZone {
        LateralZone::from_center_x(self.bbox.center_x())
    }
}

// ============================================================================
// CLASSIFICATIONS
// ============================================================================

/// Ordinal proximity. Ordered by closeness: `Far < Near < Close < VeryClose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistanceBand {
    /// >= 10m
    Far,
    /// < 10m
    Near,
    /// < 5m
    Close,
    /// < 3m
    VeryClose,
}

impl DistanceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Far => "FAR",
            Self::Near => "NEAR",
            Self::Close => "CLOSE",
            Self::VeryClose => "VERY_CLOSE",
        }
    }
}

/// Severity, totally ordered: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DangerLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl DangerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// One step up, saturating at `cap`.
    pub fn escalated(self, cap: DangerLevel) -> DangerLevel {
        let next = match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        };
        next.min(cap).max(self)
    }
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioKind {
    Horn,
    Siren,
    LoudNoise,
    None,
}

impl AudioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horn => "HORN",
            Self::Siren => "SIREN",
            Self::LoudNoise => "LOUD_NOISE",
            Self::None => "NONE",
        }
    }
}

/// Classification of one audio chunk. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub kind: AudioKind,
    /// RMS of the raw waveform
    pub energy: f32,
    pub horn_fraction: f32,
    pub siren_fraction: f32,
    pub timestamp: f64,
}

// ============================================================================
// PIPELINE INPUTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
}

/// Pixel-space rectangle as reported by a detector backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Detector output item: `(classLabel, confidence, box)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: PixelRect,
}

/// Everything the detector produced for one frame of one camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetections {
    pub camera: CameraPosition,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<RawDetection>,
    /// Fraction of moving pixels, when the acquisition layer computes it
    #[serde(default)]
    pub motion_ratio: Option<f32>,
}

/// Fixed-size mono PCM buffer from the microphone.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub timestamp: f64,
}
