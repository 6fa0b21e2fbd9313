// src/lib.rs
//
// Hazard fusion and danger classification for a cyclist carrying a front
// camera, a rear camera and a microphone.
//
//   camera frame -> detection normalizer -> distance estimator -> danger --\
//                                                                           +--> fusion engine -> alerts / ledger
//   audio chunk  -> spectral classifier  --------------------------> danger --/

pub mod audio;
pub mod config;
pub mod danger;
pub mod detection;
pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod replay;
pub mod types;

pub use error::{ConfigError, MalformedInput};
pub use fusion::{Alert, FusionEngine, FusionEvent};
pub use pipeline::{DashboardSnapshot, FusionRuntime, HazardMonitor};
pub use types::{Config, DangerLevel};
