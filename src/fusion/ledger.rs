// src/fusion/ledger.rs
//
// Bounded history of recent alert transitions for display. Entries are
// copies taken at append time and never change afterwards; the engine's
// active set stays the only mutable alert state.

use super::alert::{Alert, FusionEvent};
use crate::config::check_count;
use crate::error::ConfigError;
use crate::types::AlertSource;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Most recent entries kept (FIFO eviction beyond this)
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { capacity: 5 }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("ledger.capacity", self.capacity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    Created,
    Escalated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub transition: Transition,
    pub alert: Alert,
}

/// Distinct alerts created per source since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub front: u64,
    pub rear: u64,
    pub audio: u64,
}

impl SourceCounts {
    pub fn total(&self) -> u64 {
        self.front + self.rear + self.audio
    }

    pub fn get(&self, source: AlertSource) -> u64 {
        match source {
            AlertSource::Front => self.front,
            AlertSource::Rear => self.rear,
            AlertSource::Audio => self.audio,
        }
    }

    fn bump(&mut self, source: AlertSource) {
        match source {
            AlertSource::Front => self.front += 1,
            AlertSource::Rear => self.rear += 1,
            AlertSource::Audio => self.audio += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertLedger {
    entries: VecDeque<LedgerEntry>,
    capacity: usize,
    counts: SourceCounts,
}

impl AlertLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            counts: SourceCounts::default(),
        }
    }

    /// Append NEW and ESCALATED events. Everything else is ignored.
    pub fn record(&mut self, event: &FusionEvent) {
        match event {
            FusionEvent::New(alert) => {
                self.counts.bump(alert.source);
                self.push(Transition::Created, alert);
            }
            FusionEvent::Escalated { alert, .. } => self.push(Transition::Escalated, alert),
            _ => {}
        }
    }

    fn push(&mut self, transition: Transition, alert: &Alert) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LedgerEntry {
            transition,
            alert: alert.clone(),
        });
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    pub fn recent(&self) -> Vec<LedgerEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn counts(&self) -> SourceCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::alert::{EscalationCause, Hazard, HazardKey};
    use crate::types::{AudioKind, CameraPosition, DangerLevel, LateralZone, ObjectClass};

    fn alert(id: u64, source: CameraPosition, level: DangerLevel) -> Alert {
        let hazard = Hazard {
            key: HazardKey::object(source, ObjectClass::Car, LateralZone::Right),
            level,
            timestamp: id as f64,
        };
        Alert::open(id, &hazard)
    }

    #[test]
    fn test_fifo_eviction() {
        let mut ledger = AlertLedger::new(&LedgerConfig { capacity: 3 });
        for id in 1..=5 {
            ledger.record(&FusionEvent::New(alert(id, CameraPosition::Front, DangerLevel::High)));
        }
        let ids: Vec<u64> = ledger.entries().map(|e| e.alert.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.counts().front, 5);
        assert_eq!(ledger.counts().total(), 5);
    }

    #[test]
    fn test_escalation_is_appended_but_not_recounted() {
        let mut ledger = AlertLedger::new(&LedgerConfig::default());
        let a = alert(1, CameraPosition::Rear, DangerLevel::Medium);
        ledger.record(&FusionEvent::New(a.clone()));

        let mut escalated = a.clone();
        escalated.level = DangerLevel::High;
        ledger.record(&FusionEvent::Escalated {
            alert: escalated,
            previous: DangerLevel::Medium,
            cause: EscalationCause::Observation,
        });

        let entries = ledger.recent();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transition, Transition::Created);
        assert_eq!(entries[0].alert.level, DangerLevel::Medium);
        assert_eq!(entries[1].transition, Transition::Escalated);
        assert_eq!(entries[1].alert.level, DangerLevel::High);
        assert_eq!(ledger.counts().rear, 1);
    }

    #[test]
    fn test_cleared_and_status_events_ignored() {
        let mut ledger = AlertLedger::new(&LedgerConfig::default());
        ledger.record(&FusionEvent::Cleared(alert(1, CameraPosition::Front, DangerLevel::High)));
        ledger.record(&FusionEvent::SourceRecovered {
            source: AlertSource::Audio,
        });
        assert!(ledger.is_empty());
        assert_eq!(ledger.counts().total(), 0);
    }

    #[test]
    fn test_counts_by_source() {
        let mut ledger = AlertLedger::new(&LedgerConfig::default());
        ledger.record(&FusionEvent::New(alert(1, CameraPosition::Front, DangerLevel::High)));
        ledger.record(&FusionEvent::New(alert(2, CameraPosition::Rear, DangerLevel::High)));
        ledger.record(&FusionEvent::New(Alert::open(
            3,
            &Hazard::from_sound(AudioKind::Horn, DangerLevel::High, 0.0),
        )));
        let counts = ledger.counts();
        assert_eq!(counts.get(AlertSource::Front), 1);
        assert_eq!(counts.get(AlertSource::Rear), 1);
        assert_eq!(counts.get(AlertSource::Audio), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            LedgerConfig { capacity: 0 }.validate(),
            Err(ConfigError::ZeroCount { field: "ledger.capacity" })
        ));
    }
}
