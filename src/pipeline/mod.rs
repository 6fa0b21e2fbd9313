// src/pipeline/mod.rs

pub mod event_bus;
pub mod metrics;
pub mod monitor;
pub mod runtime;
pub mod stages;

pub use event_bus::EventBus;
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use monitor::{DashboardSnapshot, HazardMonitor};
pub use runtime::{FusionRuntime, RuntimeConfig};
pub use stages::{AudioStage, CameraStage, FrameStats, SourceReport, StageStats};
