// src/pipeline/runtime.rs
//
// Async topology:
//
//   front frames --> [camera producer] --\
//   rear frames  --> [camera producer] ---+--> mpsc (ordered merge) --> [fusion task]
//   audio chunks --> [audio producer]  --/                               |    |
//                                                 watch<DashboardSnapshot> <-+    +-> broadcast<FusionEvent>
//
// Producers run the pure classification stages and only ever send
// finished `SourceReport`s. The fusion task owns the `HazardMonitor`
// outright, so every transition is applied whole or not at all. One
// producer per source plus a FIFO channel keeps per-source order.
//
// Stop: `shutdown()` flips the watch flag, producers and the fusion task
// leave their loops between reports. `finish()` instead closes the inputs
// and lets everything already queued drain.

use super::monitor::{DashboardSnapshot, HazardMonitor};
use super::stages::{AudioStage, CameraStage, SourceReport};
use crate::config::{check_count, check_window};
use crate::error::ConfigError;
use crate::fusion::FusionEvent;
use crate::types::{AudioChunk, CameraPosition, Config, FrameDetections};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound of the merge queue and of each input queue
    pub channel_capacity: usize,
    /// Expiry / starvation sweep period
    pub sweep_interval_ms: u64,
    /// Pending events kept for pollers before the oldest are dropped
    pub event_buffer: usize,
    /// Input-clock seconds per wall-clock second, used to estimate input
    /// time between reports for timer sweeps. 1.0 for live sensors, the
    /// replay speed for paced replay.
    pub clock_rate: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            sweep_interval_ms: 250,
            event_buffer: 1024,
            clock_rate: 1.0,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("runtime.channel_capacity", self.channel_capacity)?;
        check_count("runtime.sweep_interval_ms", self.sweep_interval_ms as usize)?;
        check_count("runtime.event_buffer", self.event_buffer)?;
        check_window("runtime.clock_rate", self.clock_rate)?;
        Ok(())
    }
}

pub struct FusionRuntime {
    reports_tx: mpsc::Sender<SourceReport>,
    shutdown_tx: watch::Sender<bool>,
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
    events_tx: broadcast::Sender<FusionEvent>,
    camera_stage: CameraStage,
    config: Config,
    fusion: JoinHandle<HazardMonitor>,
    producers: Vec<JoinHandle<u64>>,
}

impl FusionRuntime {
    /// Spawn the fusion task. Must be called inside a tokio runtime.
    pub fn start(config: &Config) -> Self {
        let monitor = HazardMonitor::new(config);
        let camera_stage = monitor.camera_stage().clone();

        let (reports_tx, reports_rx) = mpsc::channel(config.runtime.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (snapshot_tx, snapshot_rx) = watch::channel(monitor.snapshot());
        let (events_tx, _) = broadcast::channel(config.runtime.event_buffer);

        let sweep = Duration::from_millis(config.runtime.sweep_interval_ms);
        let fusion = tokio::spawn(fusion_loop(
            monitor,
            reports_rx,
            shutdown_rx,
            snapshot_tx,
            events_tx.clone(),
            sweep,
            config.runtime.clock_rate,
        ));

        info!(
            "🚲 Fusion runtime started (queue {}, sweep {}ms)",
            config.runtime.channel_capacity, config.runtime.sweep_interval_ms
        );

        Self {
            reports_tx,
            shutdown_tx,
            snapshot_rx,
            events_tx,
            camera_stage,
            config: config.clone(),
            fusion,
            producers: Vec::new(),
        }
    }

    /// Attach a camera feed. Returns the sender the acquisition side
    /// pushes detector output into.
    pub fn attach_camera(&mut self, camera: CameraPosition) -> mpsc::Sender<FrameDetections> {
        let (tx, rx) = mpsc::channel(self.config.runtime.channel_capacity);
        let stage = self.camera_stage.clone();
        let handle = tokio::spawn(camera_producer(
            camera,
            stage,
            rx,
            self.reports_tx.clone(),
            self.shutdown_tx.subscribe(),
        ));
        self.producers.push(handle);
        tx
    }

    pub fn attach_audio(&mut self) -> mpsc::Sender<AudioChunk> {
        let (tx, rx) = mpsc::channel(self.config.runtime.channel_capacity);
        let stage = AudioStage::new(self.config.audio.clone());
        let handle = tokio::spawn(audio_producer(
            stage,
            rx,
            self.reports_tx.clone(),
            self.shutdown_tx.subscribe(),
        ));
        self.producers.push(handle);
        tx
    }

    /// Latest dashboard snapshot; the receiver can also `changed().await`.
    pub fn snapshots(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FusionEvent> {
        self.events_tx.subscribe()
    }

    /// Wait for all attached inputs to close, drain the queue, and return
    /// the final monitor state.
    pub async fn finish(self) -> Result<HazardMonitor> {
        let Self {
            reports_tx,
            shutdown_tx,
            fusion,
            producers,
            ..
        } = self;
        drop(reports_tx);

        let mut processed = 0;
        for producer in producers {
            processed += producer.await.context("Producer task panicked")?;
        }
        let monitor = fusion.await.context("Fusion task panicked")?;
        drop(shutdown_tx);

        info!("✓ Fusion runtime finished ({} inputs processed)", processed);
        Ok(monitor)
    }

    /// Stop now. Queued reports that were not yet applied are dropped;
    /// the one being applied completes.
    pub async fn shutdown(self) -> Result<HazardMonitor> {
        let Self {
            reports_tx,
            shutdown_tx,
            fusion,
            producers,
            ..
        } = self;

        shutdown_tx.send_replace(true);
        drop(reports_tx);

        for producer in producers {
            producer.await.context("Producer task panicked")?;
        }
        let monitor = fusion.await.context("Fusion task panicked")?;

        info!("🛑 Fusion runtime stopped");
        Ok(monitor)
    }
}

async fn camera_producer(
    camera: CameraPosition,
    stage: CameraStage,
    mut frames: mpsc::Receiver<FrameDetections>,
    reports: mpsc::Sender<SourceReport>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut processed = 0;
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if frame.camera != camera {
            warn!(
                "{} feed received a {} frame at {:.3}s, skipped",
                camera.as_str(),
                frame.camera.as_str(),
                frame.timestamp
            );
            continue;
        }

        let report = stage.process(&frame);
        processed += 1;
        if reports.send(report).await.is_err() {
            break;
        }
    }
    debug!("{} producer done ({} frames)", camera.as_str(), processed);
    processed
}

async fn audio_producer(
    mut stage: AudioStage,
    mut chunks: mpsc::Receiver<AudioChunk>,
    reports: mpsc::Sender<SourceReport>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut processed = 0;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        // Spectral work is CPU bound, keep it off the reactor threads
        let (returned, report) = match tokio::task::spawn_blocking(move || {
            let report = stage.process(&chunk);
            (stage, report)
        })
        .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!("Audio classification task failed: {}", e);
                return processed;
            }
        };
        stage = returned;
        processed += 1;

        if reports.send(report).await.is_err() {
            break;
        }
    }
    debug!("AUDIO producer done ({} chunks)", processed);
    processed
}

async fn fusion_loop(
    mut monitor: HazardMonitor,
    mut reports: mpsc::Receiver<SourceReport>,
    mut shutdown: watch::Receiver<bool>,
    snapshots: watch::Sender<DashboardSnapshot>,
    events: broadcast::Sender<FusionEvent>,
    sweep: Duration,
    clock_rate: f64,
) -> HazardMonitor {
    let mut ticker = tokio::time::interval(sweep);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Input clock at the latest applied report, and when it was applied
    let mut anchor: Option<(f64, Instant)> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            report = reports.recv() => {
                let Some(report) = report else { break };
                monitor.apply_report(report);
                if let Some(clock) = monitor.engine().clock() {
                    anchor = Some((clock, Instant::now()));
                }
                publish(&mut monitor, &snapshots, &events);
            }
            _ = ticker.tick() => {
                if let Some(now) = estimated_input_time(anchor, clock_rate) {
                    monitor.tick(now);
                }
                publish(&mut monitor, &snapshots, &events);
            }
        }
    }

    publish(&mut monitor, &snapshots, &events);
    monitor
}

/// Input time now, extrapolated from the latest report at `clock_rate`.
fn estimated_input_time(anchor: Option<(f64, Instant)>, clock_rate: f64) -> Option<f64> {
    anchor.map(|(clock, at)| clock + at.elapsed().as_secs_f64() * clock_rate)
}

fn publish(
    monitor: &mut HazardMonitor,
    snapshots: &watch::Sender<DashboardSnapshot>,
    events: &broadcast::Sender<FusionEvent>,
) {
    for event in monitor.drain_events() {
        // No subscribers is fine
        let _ = events.send(event);
    }
    snapshots.send_replace(monitor.snapshot());
}
