// src/pipeline/monitor.rs
//
// Single-threaded facade over the whole core: both classification stages,
// the fusion engine, the ledger, metrics and the event outbox. The async
// runtime drives one of these from its fusion task; tests and simple
// callers can drive it directly.

use super::event_bus::EventBus;
use super::metrics::{MetricsSummary, PipelineMetrics};
use super::stages::{AudioStage, CameraStage, SourceReport};
use crate::fusion::{
    Alert, AlertLedger, FusionEngine, FusionEvent, FusionStats, LedgerEntry, SourceCounts,
    SourceStatus,
};
use crate::types::{AudioChunk, Config, FrameDetections};
use serde::Serialize;
use std::time::Instant;

/// Read-only view for the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Engine clock (latest input timestamp), seconds
    pub clock: Option<f64>,
    /// Most severe first
    pub active: Vec<Alert>,
    /// Oldest first
    pub recent: Vec<LedgerEntry>,
    pub counts: SourceCounts,
    pub total_alerts: u64,
    pub sources: Vec<SourceStatus>,
    pub fusion: FusionStats,
    pub metrics: MetricsSummary,
}

pub struct HazardMonitor {
    camera: CameraStage,
    audio: AudioStage,
    engine: FusionEngine,
    ledger: AlertLedger,
    bus: EventBus,
    metrics: PipelineMetrics,
}

impl HazardMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            camera: CameraStage::new(config.detection.clone(), config.distance.clone()),
            audio: AudioStage::new(config.audio.clone()),
            engine: FusionEngine::new(config.fusion.clone()),
            ledger: AlertLedger::new(&config.ledger),
            bus: EventBus::new(config.runtime.event_buffer),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn process_frame(&mut self, frame: &FrameDetections) -> Vec<FusionEvent> {
        let report = self.camera.process(frame);
        self.apply_report(report)
    }

    pub fn process_audio(&mut self, chunk: &AudioChunk) -> Vec<FusionEvent> {
        let report = self.audio.process(chunk);
        self.apply_report(report)
    }

    /// Apply a report produced by a stage running elsewhere (producer task).
    pub fn apply_report(&mut self, report: SourceReport) -> Vec<FusionEvent> {
        let started = Instant::now();
        self.metrics.record_report(&report);

        let events = self
            .engine
            .ingest(report.source, report.timestamp, &report.hazards);
        self.dispatch(&events);

        self.metrics.set_timing(
            &self.metrics.fusion_time_us,
            started.elapsed().as_micros() as u64,
        );
        events
    }

    /// Timer-driven expiry and starvation checks.
    pub fn tick(&mut self, now: f64) -> Vec<FusionEvent> {
        let events = self.engine.sweep(now);
        self.dispatch(&events);
        events
    }

    fn dispatch(&mut self, events: &[FusionEvent]) {
        for event in events {
            self.ledger.record(event);
            self.metrics.record_event(event);
            self.bus.publish(event.clone());
        }
    }

    pub fn drain_events(&mut self) -> Vec<FusionEvent> {
        self.bus.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.bus.pending_count()
    }

    /// Events lost because nobody drained the outbox in time.
    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped_count()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let counts = self.ledger.counts();
        DashboardSnapshot {
            clock: self.engine.clock(),
            active: self.engine.active_alerts(),
            recent: self.ledger.recent(),
            counts,
            total_alerts: counts.total(),
            sources: self.engine.source_status(),
            fusion: self.engine.stats().clone(),
            metrics: self.metrics.summary(),
        }
    }

    pub fn camera_stage(&self) -> &CameraStage {
        &self.camera
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}
