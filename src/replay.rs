// src/replay.rs
//
// Offline input: recorded detector output (one JSON `FrameDetections` per
// line, per camera) and a WAV recording of the microphone. Everything is
// merged onto one timeline and fed through the core, either directly
// (speed 0, deterministic) or paced through the async runtime.

use crate::audio::AudioConfig;
use crate::config::check_range;
use crate::error::ConfigError;
use crate::pipeline::{FusionRuntime, HazardMonitor};
use crate::types::{AudioChunk, CameraPosition, Config, FrameDetections};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub front_detections: Option<PathBuf>,
    pub rear_detections: Option<PathBuf>,
    pub audio_wav: Option<PathBuf>,
    /// Where the WAV starts on the detection clock, seconds
    pub audio_start_s: f64,
    /// Playback rate relative to the recording. 0 replays as fast as
    /// possible on the calling thread.
    pub speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            front_detections: None,
            rear_detections: None,
            audio_wav: None,
            audio_start_s: 0.0,
            speed: 0.0,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("replay.speed", self.speed, 0.0, 1000.0)?;
        check_range("replay.audio_start_s", self.audio_start_s, 0.0, f64::MAX)?;
        Ok(())
    }
}

// ============================================================================
// TIMELINE
// ============================================================================

#[derive(Debug, Clone)]
pub enum ReplayItem {
    Frame(FrameDetections),
    Audio(AudioChunk),
}

impl ReplayItem {
    pub fn timestamp(&self) -> f64 {
        match self {
            ReplayItem::Frame(f) => f.timestamp,
            ReplayItem::Audio(c) => c.timestamp,
        }
    }
}

/// All inputs of one recording, ordered by timestamp.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    items: Vec<ReplayItem>,
}

impl Timeline {
    pub fn new(
        front: Vec<FrameDetections>,
        rear: Vec<FrameDetections>,
        audio: Vec<AudioChunk>,
    ) -> Self {
        let mut items: Vec<ReplayItem> = front
            .into_iter()
            .chain(rear)
            .map(ReplayItem::Frame)
            .chain(audio.into_iter().map(ReplayItem::Audio))
            .collect();
        // Stable: equal timestamps keep file order
        items.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        Self { items }
    }

    pub fn load(config: &Config) -> Result<Self> {
        let replay = &config.replay;
        let front = match &replay.front_detections {
            Some(path) => load_detections(path, CameraPosition::Front)?,
            None => Vec::new(),
        };
        let rear = match &replay.rear_detections {
            Some(path) => load_detections(path, CameraPosition::Rear)?,
            None => Vec::new(),
        };
        let audio = match &replay.audio_wav {
            Some(path) => load_wav_chunks(path, &config.audio, replay.audio_start_s)?,
            None => Vec::new(),
        };

        info!(
            "📼 Replay loaded: {} front frames, {} rear frames, {} audio chunks",
            front.len(),
            rear.len(),
            audio.len()
        );
        Ok(Self::new(front, rear, audio))
    }

    pub fn items(&self) -> &[ReplayItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_camera(&self, camera: CameraPosition) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i, ReplayItem::Frame(f) if f.camera == camera))
    }

    pub fn has_audio(&self) -> bool {
        self.items.iter().any(|i| matches!(i, ReplayItem::Audio(_)))
    }
}

// ============================================================================
// DETECTIONS (JSON LINES)
// ============================================================================

pub fn load_detections(path: &Path, camera: CameraPosition) -> Result<Vec<FrameDetections>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open detections {}", path.display()))?;
    read_detections(BufReader::new(file), camera)
        .with_context(|| format!("Failed to read detections {}", path.display()))
}

/// Parse one `FrameDetections` per line. Blank lines and `#` comments are
/// skipped. Records tagged with the other camera are kept as-is and left
/// for the pipeline to reject.
pub fn read_detections<R: BufRead>(reader: R, camera: CameraPosition) -> Result<Vec<FrameDetections>> {
    let mut frames = Vec::new();
    let mut foreign = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let frame: FrameDetections = serde_json::from_str(trimmed)
            .with_context(|| format!("Bad detection record on line {}", index + 1))?;
        if frame.camera != camera {
            foreign += 1;
        }
        frames.push(frame);
    }

    if foreign > 0 {
        warn!(
            "{} of {} records in the {} log are tagged with another camera",
            foreign,
            frames.len(),
            camera.as_str()
        );
    }
    Ok(frames)
}

// ============================================================================
// AUDIO (WAV)
// ============================================================================

pub fn load_wav_chunks(path: &Path, audio: &AudioConfig, start_s: f64) -> Result<Vec<AudioChunk>> {
    let file = File::open(path).with_context(|| format!("Failed to open WAV {}", path.display()))?;
    read_wav_chunks(BufReader::new(file), audio, start_s)
        .with_context(|| format!("Failed to decode WAV {}", path.display()))
}

pub fn read_wav_chunks<R: Read>(reader: R, audio: &AudioConfig, start_s: f64) -> Result<Vec<AudioChunk>> {
    let (samples, sample_rate) = read_wav_mono(reader)?;
    if sample_rate != audio.sample_rate {
        warn!(
            "WAV is {} Hz but the classifier expects {} Hz; chunks will be rejected",
            sample_rate, audio.sample_rate
        );
    }
    let chunk_len = (audio.chunk_seconds as f64 * sample_rate as f64).round() as usize;
    Ok(chunk_samples(&samples, sample_rate, chunk_len, start_s))
}

/// Decode to mono f32 in [-1, 1], averaging channels.
pub fn read_wav_mono<R: Read>(reader: R) -> Result<(Vec<f32>, u32)> {
    let mut wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            wav.samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Split into consecutive chunks. Each chunk is stamped with the time its
/// last sample was captured, matching a live recorder that hands a chunk
/// over when it is full. A trailing partial chunk is kept.
pub fn chunk_samples(samples: &[f32], sample_rate: u32, chunk_len: usize, start_s: f64) -> Vec<AudioChunk> {
    if chunk_len == 0 || sample_rate == 0 {
        return Vec::new();
    }
    let mut consumed = 0usize;
    samples
        .chunks(chunk_len)
        .map(|chunk| {
            consumed += chunk.len();
            AudioChunk {
                samples: chunk.to_vec(),
                sample_rate,
                timestamp: start_s + consumed as f64 / sample_rate as f64,
            }
        })
        .collect()
}

// ============================================================================
// DRIVERS
// ============================================================================

/// Feed the timeline straight into a monitor, in timestamp order.
pub fn run_offline(config: &Config, timeline: &Timeline) -> HazardMonitor {
    let mut monitor = HazardMonitor::new(config);
    for item in timeline.items() {
        match item {
            ReplayItem::Frame(frame) => monitor.process_frame(frame),
            ReplayItem::Audio(chunk) => monitor.process_audio(chunk),
        };
        // No pollers offline, the ledger already holds every transition
        monitor.drain_events();
    }
    if let Some(last) = timeline.items().last() {
        monitor.tick(last.timestamp());
        monitor.drain_events();
    }
    monitor
}

/// Feed the timeline through the async runtime at `speed` x real time.
pub async fn run_paced(config: &Config, timeline: Timeline, speed: f64) -> Result<HazardMonitor> {
    let mut config = config.clone();
    if speed > 0.0 {
        config.runtime.clock_rate = speed;
    }
    let mut runtime = FusionRuntime::start(&config);
    let front = timeline
        .has_camera(CameraPosition::Front)
        .then(|| runtime.attach_camera(CameraPosition::Front));
    let rear = timeline
        .has_camera(CameraPosition::Rear)
        .then(|| runtime.attach_camera(CameraPosition::Rear));
    let audio = timeline.has_audio().then(|| runtime.attach_audio());

    let started = tokio::time::Instant::now();
    let t0 = timeline.items().first().map(|i| i.timestamp()).unwrap_or(0.0);
    let speed = if speed > 0.0 { speed } else { f64::INFINITY };

    for item in timeline.items {
        let offset = ((item.timestamp() - t0) / speed).max(0.0);
        if offset.is_finite() && offset > 0.0 {
            tokio::time::sleep_until(started + Duration::from_secs_f64(offset)).await;
        }

        let sent = match item {
            ReplayItem::Frame(frame) => {
                let tx = match frame.camera {
                    CameraPosition::Front => front.as_ref(),
                    CameraPosition::Rear => rear.as_ref(),
                };
                match tx {
                    Some(tx) => tx.send(frame).await.is_ok(),
                    None => true,
                }
            }
            ReplayItem::Audio(chunk) => match audio.as_ref() {
                Some(tx) => tx.send(chunk).await.is_ok(),
                None => true,
            },
        };
        if !sent {
            warn!("Pipeline input closed early, stopping replay");
            break;
        }
    }

    drop(front);
    drop(rear);
    drop(audio);
    runtime.finish().await
}
