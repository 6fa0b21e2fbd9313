// src/detection/normalizer.rs
//
// Raw detector output (pixel rects + free-form labels) -> Observation.
//
// Pure function of its input. Bad items are dropped and counted, never
// raised: a single broken box must not cost us the rest of the frame.

use crate::config::check_unit;
use crate::error::{ConfigError, MalformedInput};
use crate::types::{FrameDetections, NormalizedBox, ObjectClass, Observation, RawDetection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Detections below this confidence are filtered out. Plain threshold,
    /// configurable per deployment.
    pub confidence_floor: f32,
    /// Frames whose motion ratio exceeds this are counted as "with motion"
    pub motion_threshold: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.4,
            motion_threshold: 0.05,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("detection.confidence_floor", self.confidence_floor as f64)?;
        check_unit("detection.motion_threshold", self.motion_threshold as f64)?;
        Ok(())
    }
}

/// What survived normalization, plus an account of what did not.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFrame {
    pub observations: Vec<Observation>,
    pub malformed: HashMap<MalformedInput, u32>,
    pub low_confidence: u32,
    pub unknown_class: u32,
    pub has_motion: bool,
}

impl NormalizedFrame {
    pub fn malformed_count(&self) -> u32 {
        self.malformed.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct DetectionNormalizer {
    config: NormalizerConfig,
}

impl DetectionNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(&self, frame: &FrameDetections) -> NormalizedFrame {
        let mut out = NormalizedFrame {
            has_motion: frame
                .motion_ratio
                .map(|m| m.is_finite() && m > self.config.motion_threshold)
                .unwrap_or(false),
            ..NormalizedFrame::default()
        };

        if frame.width == 0 || frame.height == 0 {
            if !frame.detections.is_empty() {
                *out
                    .malformed
                    .entry(MalformedInput::EmptyFrame)
                    .or_insert(0) += frame.detections.len() as u32;
            }
            return out;
        }

        let (fw, fh) = (frame.width as f32, frame.height as f32);

        for det in &frame.detections {
            let Some(object_class) = ObjectClass::from_label(&det.label) else {
                out.unknown_class += 1;
                continue;
            };

            let bbox = match normalize_box(det, fw, fh) {
                Ok(bbox) => bbox,
                Err(reason) => {
                    debug!(
                        "{} dropped {} detection: {}",
                        frame.camera.as_str(),
                        det.label,
                        reason.as_str()
                    );
                    *out.malformed.entry(reason).or_insert(0) += 1;
                    continue;
                }
            };

            if det.confidence < self.config.confidence_floor {
                out.low_confidence += 1;
                continue;
            }

            out.observations.push(Observation {
                source: frame.camera,
                object_class,
                bbox,
                confidence: det.confidence,
                timestamp: frame.timestamp,
            });
        }

        out
    }
}

fn normalize_box(det: &RawDetection, fw: f32, fh: f32) -> Result<NormalizedBox, MalformedInput> {
    let r = det.bbox;
    if ![r.x, r.y, r.w, r.h, det.confidence]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(MalformedInput::NonFinite);
    }
    if !(0.0..=1.0).contains(&det.confidence) {
        return Err(MalformedInput::ConfidenceOutOfRange);
    }
    if r.w <= 0.0 || r.h <= 0.0 {
        return Err(MalformedInput::NonPositiveSize);
    }
    if r.x < 0.0 || r.y < 0.0 || r.x + r.w > fw || r.y + r.h > fh {
        return Err(MalformedInput::OutOfFrame);
    }

    Ok(NormalizedBox {
        x: r.x / fw,
        y: r.y / fh,
        w: r.w / fw,
        h: r.h / fh,
    })
}
