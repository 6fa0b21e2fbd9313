// src/pipeline/metrics.rs
//
// Cumulative counters for the dashboard and the end-of-run log. Cheap to
// clone and bump from any task; reads are relaxed snapshots.

use super::stages::{SourceReport, StageStats};
use crate::fusion::FusionEvent;
use crate::types::{AlertSource, AudioKind};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub front_frames: Arc<AtomicU64>,
    pub rear_frames: Arc<AtomicU64>,
    pub frames_with_motion: Arc<AtomicU64>,
    pub observations: Arc<AtomicU64>,
    pub far_observations: Arc<AtomicU64>,
    pub malformed_detections: Arc<AtomicU64>,
    pub low_confidence: Arc<AtomicU64>,
    pub unknown_class: Arc<AtomicU64>,
    pub audio_chunks: Arc<AtomicU64>,
    pub malformed_chunks: Arc<AtomicU64>,
    pub horn_chunks: Arc<AtomicU64>,
    pub siren_chunks: Arc<AtomicU64>,
    pub loud_chunks: Arc<AtomicU64>,
    pub alerts_created: Arc<AtomicU64>,
    pub alerts_escalated: Arc<AtomicU64>,
    pub alerts_cleared: Arc<AtomicU64>,
    pub starvation_warnings: Arc<AtomicU64>,
    pub fusion_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            front_frames: Arc::new(AtomicU64::new(0)),
            rear_frames: Arc::new(AtomicU64::new(0)),
            frames_with_motion: Arc::new(AtomicU64::new(0)),
            observations: Arc::new(AtomicU64::new(0)),
            far_observations: Arc::new(AtomicU64::new(0)),
            malformed_detections: Arc::new(AtomicU64::new(0)),
            low_confidence: Arc::new(AtomicU64::new(0)),
            unknown_class: Arc::new(AtomicU64::new(0)),
            audio_chunks: Arc::new(AtomicU64::new(0)),
            malformed_chunks: Arc::new(AtomicU64::new(0)),
            horn_chunks: Arc::new(AtomicU64::new(0)),
            siren_chunks: Arc::new(AtomicU64::new(0)),
            loud_chunks: Arc::new(AtomicU64::new(0)),
            alerts_created: Arc::new(AtomicU64::new(0)),
            alerts_escalated: Arc::new(AtomicU64::new(0)),
            alerts_cleared: Arc::new(AtomicU64::new(0)),
            starvation_warnings: Arc::new(AtomicU64::new(0)),
            fusion_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn record_report(&self, report: &SourceReport) {
        match &report.stats {
            StageStats::Frame(stats) => {
                match report.source {
                    AlertSource::Rear => self.inc(&self.rear_frames),
                    _ => self.inc(&self.front_frames),
                }
                if stats.has_motion {
                    self.inc(&self.frames_with_motion);
                }
                self.add(&self.observations, stats.observations as u64);
                self.add(&self.far_observations, stats.far as u64);
                self.add(&self.malformed_detections, stats.malformed as u64);
                self.add(&self.low_confidence, stats.low_confidence as u64);
                self.add(&self.unknown_class, stats.unknown_class as u64);
            }
            StageStats::Chunk { kind, malformed } => {
                self.inc(&self.audio_chunks);
                if malformed.is_some() {
                    self.inc(&self.malformed_chunks);
                }
                match kind {
                    AudioKind::Horn => self.inc(&self.horn_chunks),
                    AudioKind::Siren => self.inc(&self.siren_chunks),
                    AudioKind::LoudNoise => self.inc(&self.loud_chunks),
                    AudioKind::None => {}
                }
            }
        }
    }

    pub fn record_event(&self, event: &FusionEvent) {
        match event {
            FusionEvent::New(_) => self.inc(&self.alerts_created),
            FusionEvent::Escalated { .. } => self.inc(&self.alerts_escalated),
            FusionEvent::Cleared(_) => self.inc(&self.alerts_cleared),
            FusionEvent::SourceStarved { .. } => self.inc(&self.starvation_warnings),
            FusionEvent::SourceRecovered { .. } => {}
        }
    }

    pub fn fps(&self) -> f64 {
        let frames = self.front_frames.load(Ordering::Relaxed) + self.rear_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            front_frames: self.front_frames.load(Ordering::Relaxed),
            rear_frames: self.rear_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_with_motion: self.frames_with_motion.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            far_observations: self.far_observations.load(Ordering::Relaxed),
            malformed_detections: self.malformed_detections.load(Ordering::Relaxed),
            low_confidence: self.low_confidence.load(Ordering::Relaxed),
            unknown_class: self.unknown_class.load(Ordering::Relaxed),
            audio_chunks: self.audio_chunks.load(Ordering::Relaxed),
            malformed_chunks: self.malformed_chunks.load(Ordering::Relaxed),
            horn_chunks: self.horn_chunks.load(Ordering::Relaxed),
            siren_chunks: self.siren_chunks.load(Ordering::Relaxed),
            loud_chunks: self.loud_chunks.load(Ordering::Relaxed),
            alerts_created: self.alerts_created.load(Ordering::Relaxed),
            alerts_escalated: self.alerts_escalated.load(Ordering::Relaxed),
            alerts_cleared: self.alerts_cleared.load(Ordering::Relaxed),
            starvation_warnings: self.starvation_warnings.load(Ordering::Relaxed),
            last_fusion_us: self.fusion_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub front_frames: u64,
    pub rear_frames: u64,
    pub fps: f64,
    pub frames_with_motion: u64,
    pub observations: u64,
    pub far_observations: u64,
    pub malformed_detections: u64,
    pub low_confidence: u64,
    pub unknown_class: u64,
    pub audio_chunks: u64,
    pub malformed_chunks: u64,
    pub horn_chunks: u64,
    pub siren_chunks: u64,
    pub loud_chunks: u64,
    pub alerts_created: u64,
    pub alerts_escalated: u64,
    pub alerts_cleared: u64,
    pub starvation_warnings: u64,
    pub last_fusion_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedInput;
    use crate::pipeline::stages::FrameStats;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let clone = metrics.clone();
        clone.inc(&clone.audio_chunks);
        metrics.inc(&metrics.audio_chunks);
        assert_eq!(metrics.summary().audio_chunks, 2);
    }

    #[test]
    fn test_record_reports() {
        let metrics = PipelineMetrics::new();
        metrics.record_report(&SourceReport {
            source: AlertSource::Rear,
            timestamp: 0.0,
            hazards: Vec::new(),
            stats: StageStats::Frame(FrameStats {
                observations: 3,
                far: 1,
                malformed: 2,
                low_confidence: 1,
                unknown_class: 4,
                has_motion: true,
            }),
        });
        metrics.record_report(&SourceReport {
            source: AlertSource::Audio,
            timestamp: 0.0,
            hazards: Vec::new(),
            stats: StageStats::Chunk {
                kind: AudioKind::None,
                malformed: Some(MalformedInput::ShortChunk),
            },
        });

        let s = metrics.summary();
        assert_eq!(s.rear_frames, 1);
        assert_eq!(s.front_frames, 0);
        assert_eq!(s.frames_with_motion, 1);
        assert_eq!(s.observations, 3);
        assert_eq!(s.far_observations, 1);
        assert_eq!(s.malformed_detections, 2);
        assert_eq!(s.unknown_class, 4);
        assert_eq!(s.audio_chunks, 1);
        assert_eq!(s.malformed_chunks, 1);
    }
}
