// src/fusion/mod.rs

pub mod alert;
pub mod engine;
pub mod ledger;

pub use alert::{Alert, EscalationCause, FusionEvent, Hazard, HazardBucket, HazardKey};
pub use engine::{FusionConfig, FusionEngine, FusionStats, SourceStatus};
pub use ledger::{AlertLedger, LedgerConfig, LedgerEntry, SourceCounts, Transition};
