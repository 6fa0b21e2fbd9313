// src/detection/backend.rs
//
// Capability interface for detector backends. The rest of the crate only
// ever sees `ObjectDetector`; a neural model and a classical cascade are
// interchangeable as long as they return labelled pixel rects.

use crate::types::{CameraPosition, Frame, FrameDetections, RawDetection};
use anyhow::Result;
use tracing::{debug, warn};

pub trait ObjectDetector: Send {
    fn name(&self) -> &str;

    /// Backends that failed to load report false and are skipped.
    fn is_available(&self) -> bool {
        true
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        (**self).detect(frame)
    }
}

/// Primary backend with an ordered list of fallbacks. The first available
/// backend that succeeds wins the frame.
pub struct DetectorChain {
    backends: Vec<Box<dyn ObjectDetector>>,
    fallbacks_used: u64,
}

impl DetectorChain {
    pub fn new(primary: Box<dyn ObjectDetector>) -> Self {
        Self {
            backends: vec![primary],
            fallbacks_used: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn ObjectDetector>) -> Self {
        self.backends.push(fallback);
        self
    }

    pub fn fallbacks_used(&self) -> u64 {
        self.fallbacks_used
    }
}

impl ObjectDetector for DetectorChain {
    fn name(&self) -> &str {
        self.backends
            .iter()
            .find(|b| b.is_available())
            .map(|b| b.name())
            .unwrap_or("none")
    }

    fn is_available(&self) -> bool {
        self.backends.iter().any(|b| b.is_available())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let mut last_err = None;

        for (i, backend) in self.backends.iter_mut().enumerate() {
            if !backend.is_available() {
                continue;
            }
            match backend.detect(frame) {
                Ok(detections) => {
                    if i > 0 {
                        self.fallbacks_used += 1;
                        debug!("Frame served by fallback detector {}", backend.name());
                    }
                    return Ok(detections);
                }
                Err(e) => {
                    warn!("Detector {} failed: {:#}", backend.name(), e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("No detector backend available")))
    }
}

/// Run a detector over one frame and package the result for the pipeline.
pub fn detect_frame<D: ObjectDetector + ?Sized>(
    detector: &mut D,
    camera: CameraPosition,
    frame: &Frame,
) -> Result<FrameDetections> {
    let detections = detector.detect(frame)?;
    Ok(FrameDetections {
        camera,
        timestamp: frame.timestamp,
        width: frame.width as u32,
        height: frame.height as u32,
        detections,
        motion_ratio: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelRect;

    struct Fixed {
        name: &'static str,
        available: bool,
        fail: bool,
        label: &'static str,
    }

    impl ObjectDetector for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
            if self.fail {
                anyhow::bail!("backend crashed");
            }
            Ok(vec![RawDetection {
                label: self.label.to_string(),
                confidence: 0.7,
                bbox: PixelRect {
                    x: 0.0,
                    y: 0.0,
                    w: 10.0,
                    h: 10.0,
                },
            }])
        }
    }

    fn frame() -> Frame {
        Frame {
            data: Vec::new(),
            width: 640,
            height: 480,
            timestamp: 2.5,
        }
    }

    fn backend(name: &'static str, available: bool, fail: bool, label: &'static str) -> Box<Fixed> {
        Box::new(Fixed {
            name,
            available,
            fail,
            label,
        })
    }

    #[test]
    fn test_primary_used_when_healthy() {
        let mut chain = DetectorChain::new(backend("yolo", true, false, "car"))
            .with_fallback(backend("cascade", true, false, "vehicle"));
        let dets = chain.detect(&frame()).unwrap();
        assert_eq!(dets[0].label, "car");
        assert_eq!(chain.fallbacks_used(), 0);
        assert_eq!(chain.name(), "yolo");
    }

    #[test]
    fn test_unavailable_primary_falls_back() {
        let mut chain = DetectorChain::new(backend("yolo", false, false, "car"))
            .with_fallback(backend("cascade", true, false, "vehicle"));
        assert_eq!(chain.name(), "cascade");
        let dets = chain.detect(&frame()).unwrap();
        assert_eq!(dets[0].label, "vehicle");
        assert_eq!(chain.fallbacks_used(), 1);
    }

    #[test]
    fn test_failing_primary_falls_back() {
        let mut chain = DetectorChain::new(backend("yolo", true, true, "car"))
            .with_fallback(backend("cascade", true, false, "vehicle"));
        assert_eq!(chain.detect(&frame()).unwrap()[0].label, "vehicle");
    }

    #[test]
    fn test_all_failing_is_error() {
        let mut chain = DetectorChain::new(backend("yolo", true, true, "car"));
        assert!(chain.detect(&frame()).is_err());
    }

    #[test]
    fn test_detect_frame_packages_dimensions() {
        let mut d = backend("yolo", true, false, "bus");
        let out = detect_frame(&mut d, CameraPosition::Rear, &frame()).unwrap();
        assert_eq!(out.camera, CameraPosition::Rear);
        assert_eq!((out.width, out.height), (640, 480));
        assert_eq!(out.timestamp, 2.5);
        assert_eq!(out.detections.len(), 1);
    }
}
