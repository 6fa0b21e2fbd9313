// src/detection/yolo.rs
//
// YOLOv8 ONNX backend (feature `yolo`). Letterbox -> infer -> decode ->
// NMS, emitting labelled pixel rects for the normalizer. Class filtering
// by taxonomy happens downstream; here we only keep COCO ids the
// taxonomy knows about.

use super::backend::ObjectDetector;
use crate::types::{Frame, PixelRect, RawDetection};
use anyhow::{Context, Result};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info, warn};

const INPUT_SIZE: usize = 640;
const NUM_CLASSES: usize = 80;
const NUM_PREDICTIONS: usize = 8400;
const NMS_IOU: f32 = 0.45;
const PAD_VALUE: u8 = 114;

/// COCO ids we forward: person, bicycle, car, motorcycle, bus, truck
fn coco_label(class_id: usize) -> Option<&'static str> {
    match class_id {
        0 => Some("person"),
        1 => Some("bicycle"),
        2 => Some("car"),
        3 => Some("motorcycle"),
        5 => Some("bus"),
        7 => Some("truck"),
        _ => None,
    }
}

/// Letterbox geometry for mapping model coords back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

pub struct YoloDetector {
    session: Option<Session>,
    min_confidence: f32,
}

impl YoloDetector {
    /// A model that fails to load leaves the backend unavailable instead
    /// of failing startup, so a fallback chain can take over.
    pub fn load(model_path: &str, min_confidence: f32) -> Self {
        match Self::build_session(model_path) {
            Ok(session) => {
                info!("✓ YOLO detector loaded from {}", model_path);
                Self {
                    session: Some(session),
                    min_confidence,
                }
            }
            Err(e) => {
                warn!("YOLO model unavailable ({:#}), backend disabled", e);
                Self {
                    session: None,
                    min_confidence,
                }
            }
        }
    }

    fn build_session(model_path: &str) -> Result<Session> {
        let session = Session::builder()?
            .with_execution_providers([CUDAExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("Failed to load YOLO model")?;
        Ok(session)
    }
}

impl ObjectDetector for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn is_available(&self) -> bool {
        self.session.is_some()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let session = self
            .session
            .as_mut()
            .context("YOLO session not loaded")?;

        if frame.data.len() < frame.width * frame.height * 3 {
            anyhow::bail!(
                "Frame buffer too small for {}x{} RGB",
                frame.width,
                frame.height
            );
        }

        let (input, letterbox) = letterbox_chw(&frame.data, frame.width, frame.height);

        let shape = [1, 3, INPUT_SIZE, INPUT_SIZE];
        let value = ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;
        let outputs = session.run(ort::inputs!["images" => value])?;
        let (_, raw) = outputs[0].try_extract_tensor::<f32>()?;

        let detections = decode(raw, letterbox, self.min_confidence);
        debug!("YOLO produced {} detections", detections.len());
        Ok(detections)
    }
}

/// Resize into a padded 640x640 canvas and convert HWC u8 -> CHW f32.
fn letterbox_chw(src: &[u8], src_w: usize, src_h: usize) -> (Vec<f32>, Letterbox) {
    let scale = (INPUT_SIZE as f32 / src_w as f32).min(INPUT_SIZE as f32 / src_h as f32);
    let dst_w = ((src_w as f32 * scale) as usize).max(1);
    let dst_h = ((src_h as f32 * scale) as usize).max(1);
    let pad_x = (INPUT_SIZE - dst_w) / 2;
    let pad_y = (INPUT_SIZE - dst_h) / 2;

    let plane = INPUT_SIZE * INPUT_SIZE;
    let mut input = vec![PAD_VALUE as f32 / 255.0; 3 * plane];

    // Nearest-neighbour is enough at detector input resolution
    for y in 0..dst_h {
        let sy = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..dst_w {
            let sx = ((x as f32 / scale) as usize).min(src_w - 1);
            let s = (sy * src_w + sx) * 3;
            let d = (y + pad_y) * INPUT_SIZE + (x + pad_x);
            for c in 0..3 {
                input[c * plane + d] = src[s + c] as f32 / 255.0;
            }
        }
    }

    (
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Decode the [1, 84, 8400] head into frame-space rects, then NMS.
fn decode(output: &[f32], lb: Letterbox, min_confidence: f32) -> Vec<RawDetection> {
    let mut candidates = Vec::new();
    if output.len() < NUM_PREDICTIONS * (4 + NUM_CLASSES) {
        return candidates;
    }

    for i in 0..NUM_PREDICTIONS {
        let (best_class, best_conf) = (0..NUM_CLASSES)
            .map(|c| (c, output[NUM_PREDICTIONS * (4 + c) + i]))
            .fold((0, 0.0f32), |acc, x| if x.1 > acc.1 { x } else { acc });

        let Some(label) = coco_label(best_class) else {
            continue;
        };
        if best_conf < min_confidence {
            continue;
        }

        let cx = output[i];
        let cy = output[NUM_PREDICTIONS + i];
        let w = output[NUM_PREDICTIONS * 2 + i];
        let h = output[NUM_PREDICTIONS * 3 + i];

        candidates.push(RawDetection {
            label: label.to_string(),
            confidence: best_conf,
            bbox: PixelRect {
                x: (cx - w / 2.0 - lb.pad_x) / lb.scale,
                y: (cy - h / 2.0 - lb.pad_y) / lb.scale,
                w: w / lb.scale,
                h: h / lb.scale,
            },
        });
    }

    nms(candidates, NMS_IOU)
}

fn nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in detections {
        if keep
            .iter()
            .all(|k| k.label != det.label || iou(&k.bbox, &det.bbox) < iou_threshold)
        {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &PixelRect, b: &PixelRect) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.w * a.h + b.w * b.h - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> PixelRect {
        PixelRect { x, y, w, h }
    }

    fn det(label: &str, confidence: f32, r: PixelRect) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence,
            bbox: r,
        }
    }

    #[test]
    fn test_iou() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(50.0, 50.0, 100.0, 100.0);
        assert!((iou(&a, &b) - 2500.0 / 17500.0).abs() < 1e-3);
        assert_eq!(iou(&a, &rect(200.0, 200.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_per_overlap() {
        let dets = vec![
            det("car", 0.6, rect(0.0, 0.0, 100.0, 100.0)),
            det("car", 0.9, rect(5.0, 5.0, 100.0, 100.0)),
            det("truck", 0.5, rect(5.0, 5.0, 100.0, 100.0)),
        ];
        let kept = nms(dets, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].label, "truck");
    }

    #[test]
    fn test_decode_maps_back_through_letterbox() {
        let mut output = vec![0.0f32; NUM_PREDICTIONS * (4 + NUM_CLASSES)];
        // One car centred at (320, 320) in model space, 64x64
        output[0] = 320.0;
        output[NUM_PREDICTIONS] = 320.0;
        output[NUM_PREDICTIONS * 2] = 64.0;
        output[NUM_PREDICTIONS * 3] = 64.0;
        output[NUM_PREDICTIONS * (4 + 2)] = 0.8;

        let lb = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 80.0,
        };
        let dets = decode(&output, lb, 0.25);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "car");
        assert!((dets[0].bbox.x - 576.0).abs() < 1e-3);
        assert!((dets[0].bbox.y - 416.0).abs() < 1e-3);
        assert!((dets[0].bbox.w - 128.0).abs() < 1e-3);
    }
}
