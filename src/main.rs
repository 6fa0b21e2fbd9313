// src/main.rs
//
// Replay binary: loads config.yaml (or the path given as first argument),
// feeds the recorded camera detections and microphone WAV through the
// core, and prints the final dashboard snapshot as JSON.

use anyhow::Result;
use cyclesafe::pipeline::DashboardSnapshot;
use cyclesafe::replay::{self, Timeline};
use cyclesafe::types::Config;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let explicit = std::env::args().nth(1);
    let config_path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let config = if explicit.is_none() && !Path::new(&config_path).exists() {
        Config::default()
    } else {
        Config::load(&config_path)?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},ort=warn", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚲 Cycling hazard monitor starting");
    if explicit.is_none() && !Path::new(&config_path).exists() {
        warn!("{} not found, running with defaults", config_path);
    } else {
        info!("✓ Configuration loaded from {}", config_path);
    }
    info!(
        "Fusion: silence window {:.1}s, corroboration window {:.1}s (cap {})",
        config.fusion.silence_window_s,
        config.fusion.corroboration_window_s,
        config.fusion.corroboration_cap
    );

    let timeline = Timeline::load(&config)?;
    if timeline.is_empty() {
        warn!("Nothing to replay: set replay.front_detections, replay.rear_detections or replay.audio_wav");
        return Ok(());
    }

    let speed = config.replay.speed;
    let monitor = if speed > 0.0 {
        info!("▶️  Paced replay at {:.1}x through the async runtime", speed);
        replay::run_paced(&config, timeline, speed).await?
    } else {
        info!("⏩ Offline replay of {} inputs", timeline.len());
        replay::run_offline(&config, &timeline)
    };

    let snapshot = monitor.snapshot();
    log_report(&snapshot);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn log_report(snapshot: &DashboardSnapshot) {
    let m = &snapshot.metrics;
    info!("\n📊 Final Report:");
    info!("  Frames: {} front, {} rear ({} with motion)", m.front_frames, m.rear_frames, m.frames_with_motion);
    info!(
        "  Observations: {} ({} far, {} malformed, {} low confidence, {} unknown class)",
        m.observations, m.far_observations, m.malformed_detections, m.low_confidence, m.unknown_class
    );
    info!(
        "  🔊 Audio chunks: {} (horn {}, siren {}, loud {}, rejected {})",
        m.audio_chunks, m.horn_chunks, m.siren_chunks, m.loud_chunks, m.malformed_chunks
    );
    info!(
        "  🚨 Alerts: {} created ({} front / {} rear / {} audio), {} escalations, {} cleared",
        snapshot.total_alerts,
        snapshot.counts.front,
        snapshot.counts.rear,
        snapshot.counts.audio,
        m.alerts_escalated,
        m.alerts_cleared
    );
    if snapshot.fusion.stale_discarded > 0 {
        info!("  ⚠️  Out-of-order inputs discarded: {}", snapshot.fusion.stale_discarded);
    }
    for alert in &snapshot.active {
        info!("  ACTIVE #{} {} (x{})", alert.id, alert.describe(), alert.occurrence_count);
    }
}
