// src/detection/mod.rs
//
// Camera side of the core:
//   detector backend -> normalizer -> distance estimator
//
// The danger classifier and fusion engine take it from there.

pub mod backend;
pub mod distance;
pub mod normalizer;
#[cfg(feature = "yolo")]
pub mod yolo;

pub use backend::{detect_frame, DetectorChain, ObjectDetector};
pub use distance::{BandThresholds, DistanceCalibration, DistanceEstimator};
pub use normalizer::{DetectionNormalizer, NormalizedFrame, NormalizerConfig};
#[cfg(feature = "yolo")]
pub use yolo::YoloDetector;
