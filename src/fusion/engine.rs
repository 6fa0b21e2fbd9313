// src/fusion/engine.rs
//
// Fusion & dedup state machine. Per hazard key:
//
//   ABSENT --hazard--> ACTIVE --(silence window, no observation)--> ABSENT
//                        |  ^
//                        +--+  same or lower level: refresh only, no event
//                             higher level: escalate in place, one event
//
// Guarantees:
//   - at most one NEW / ESCALATED event per lifecycle transition, however
//     fast the detector runs
//   - an alert's level never decreases while it is active
//   - last_seen_at never moves backwards; late observations are discarded
//
// Cross-source corroboration is an explicit join over the active set after
// every update: a camera vehicle alert whose last sighting lies within the
// corroboration window of an active SIREN alert is escalated one level
// (capped), once per alert lifetime.
//
// The engine owns the active set outright. Callers serialize access (one
// fusion task, or a lock around the engine); nothing here is shared.

use super::alert::{Alert, EscalationCause, FusionEvent, Hazard, HazardKey};
use crate::config::check_window;
use crate::error::ConfigError;
use crate::types::{AlertSource, DangerLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// An active alert with no observation for longer than this is cleared
    pub silence_window_s: f64,
    /// Max gap between a vehicle sighting and a siren for corroboration
    pub corroboration_window_s: f64,
    /// Ceiling for corroboration escalation
    pub corroboration_cap: DangerLevel,
    /// Sources that should be producing input; silence beyond the window
    /// is reported as starvation
    pub expected_sources: Vec<AlertSource>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            silence_window_s: 2.0,
            corroboration_window_s: 1.0,
            corroboration_cap: DangerLevel::Critical,
            expected_sources: AlertSource::ALL.to_vec(),
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_window("fusion.silence_window_s", self.silence_window_s)?;
        check_window("fusion.corroboration_window_s", self.corroboration_window_s)?;
        if self.corroboration_cap < DangerLevel::Medium {
            return Err(ConfigError::CapBelowAlertLevel {
                cap: self.corroboration_cap.as_str(),
                min: DangerLevel::Medium.as_str(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: AlertSource,
    pub starved: bool,
    pub last_seen_at: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionStats {
    pub created: u64,
    pub escalated: u64,
    pub corroborated: u64,
    pub refreshed: u64,
    pub cleared: u64,
    pub stale_discarded: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Default)]
struct Heartbeat {
    last_seen: Option<f64>,
    starved: bool,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct FusionEngine {
    config: FusionConfig,
    active: HashMap<HazardKey, Alert>,
    next_id: u64,
    /// Latest timestamp seen from any source
    clock: Option<f64>,
    started_at: Option<f64>,
    heartbeats: HashMap<AlertSource, Heartbeat>,
    stats: FusionStats,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        let heartbeats = config
            .expected_sources
            .iter()
            .map(|&s| (s, Heartbeat::default()))
            .collect();
        Self {
            config,
            active: HashMap::new(),
            next_id: 1,
            clock: None,
            started_at: None,
            heartbeats,
            stats: FusionStats::default(),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Apply everything one frame or chunk produced, as one transition.
    /// An empty `hazards` slice still counts as the source being alive.
    pub fn ingest(
        &mut self,
        source: AlertSource,
        timestamp: f64,
        hazards: &[Hazard],
    ) -> Vec<FusionEvent> {
        if !timestamp.is_finite() {
            self.stats.rejected += hazards.len() as u64;
            warn!("{} report with non-finite timestamp discarded", source);
            return Vec::new();
        }

        let mut events = self.heartbeat(source, timestamp);
        let now = self.clock.unwrap_or(timestamp);
        events.extend(self.housekeeping(now));

        for hazard in hazards {
            if hazard.key.source != source {
                self.stats.rejected += 1;
                warn!(
                    "{} report carried a {} hazard ({}), discarded",
                    source,
                    hazard.key.source,
                    hazard.key.label()
                );
                continue;
            }
            if let Some(event) = self.observe(*hazard) {
                events.push(event);
            }
        }

        events.extend(self.corroborate());
        events
    }

    /// Single-hazard convenience over `ingest`.
    pub fn apply(&mut self, hazard: Hazard) -> Vec<FusionEvent> {
        self.ingest(hazard.key.source, hazard.timestamp, &[hazard])
    }

    /// Timer tick: expiry and starvation checks as of `now`. The input
    /// clock used to judge late observations only moves with real input,
    /// so a tick that runs ahead of the inputs never makes them stale.
    pub fn sweep(&mut self, now: f64) -> Vec<FusionEvent> {
        let Some(clock) = self.clock else {
            return Vec::new();
        };
        let now = if now.is_finite() { clock.max(now) } else { clock };
        self.housekeeping(now)
    }

    /// Active alerts, most severe first, then oldest first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.active.values().cloned().collect();
        alerts.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(a.created_at.total_cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        alerts
    }

    pub fn active_alert(&self, key: &HazardKey) -> Option<&Alert> {
        self.active.get(key)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        let mut status: Vec<SourceStatus> = self
            .heartbeats
            .iter()
            .map(|(&source, hb)| SourceStatus {
                source,
                starved: hb.starved,
                last_seen_at: hb.last_seen,
            })
            .collect();
        status.sort_by_key(|s| s.source);
        status
    }

    pub fn clock(&self) -> Option<f64> {
        self.clock
    }

    pub fn stats(&self) -> &FusionStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // transitions
    // ------------------------------------------------------------------------

    fn advance(&mut self, t: f64) {
        self.clock = Some(self.clock.map_or(t, |c| c.max(t)));
        if self.started_at.is_none() {
            self.started_at = Some(t);
        }
    }

    fn heartbeat(&mut self, source: AlertSource, timestamp: f64) -> Vec<FusionEvent> {
        self.advance(timestamp);

        let Some(hb) = self.heartbeats.get_mut(&source) else {
            return Vec::new();
        };
        hb.last_seen = Some(hb.last_seen.map_or(timestamp, |t| t.max(timestamp)));
        if hb.starved {
            hb.starved = false;
            info!("📡 {} input resumed", source);
            return vec![FusionEvent::SourceRecovered { source }];
        }
        Vec::new()
    }

    fn housekeeping(&mut self, now: f64) -> Vec<FusionEvent> {
        let mut events = self.expire(now);
        events.extend(self.check_starvation(now));
        events
    }

    fn observe(&mut self, hazard: Hazard) -> Option<FusionEvent> {
        if !hazard.timestamp.is_finite() || hazard.level < DangerLevel::Medium {
            self.stats.rejected += 1;
            debug!("Hazard {} rejected ({:?})", hazard.key.label(), hazard.level);
            return None;
        }

        let now = self.clock.unwrap_or(hazard.timestamp);
        if now - hazard.timestamp > self.config.silence_window_s {
            self.stats.stale_discarded += 1;
            warn!(
                "Hazard {} at {:.3}s arrived after its silence window (clock {:.3}s), discarded",
                hazard.key.label(),
                hazard.timestamp,
                now
            );
            return None;
        }

        if let Some(alert) = self.active.get_mut(&hazard.key) {
            if hazard.timestamp < alert.last_seen_at {
                self.stats.stale_discarded += 1;
                warn!(
                    "Out-of-order hazard {} at {:.3}s (alert #{} last seen {:.3}s), discarded",
                    hazard.key.label(),
                    hazard.timestamp,
                    alert.id,
                    alert.last_seen_at
                );
                return None;
            }

            alert.last_seen_at = hazard.timestamp;
            alert.occurrence_count += 1;

            if hazard.level > alert.level {
                let previous = alert.level;
                alert.level = hazard.level;
                self.stats.escalated += 1;
                info!(
                    "⬆️  Alert #{} escalated {} -> {}: {}",
                    alert.id,
                    previous,
                    alert.level,
                    alert.describe()
                );
                return Some(FusionEvent::Escalated {
                    alert: alert.clone(),
                    previous,
                    cause: EscalationCause::Observation,
                });
            }

            self.stats.refreshed += 1;
            trace!(
                "Alert #{} refreshed (x{})",
                alert.id,
                alert.occurrence_count
            );
            return None;
        }

        let alert = Alert::open(self.next_id, &hazard);
        self.next_id += 1;
        self.stats.created += 1;
        info!("🚨 Alert #{} {}", alert.id, alert.describe());
        self.active.insert(hazard.key, alert.clone());
        Some(FusionEvent::New(alert))
    }

    fn expire(&mut self, now: f64) -> Vec<FusionEvent> {
        let window = self.config.silence_window_s;

        let mut expired: Vec<HazardKey> = self
            .active
            .iter()
            .filter(|(_, a)| now - a.last_seen_at > window)
            .map(|(k, _)| *k)
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }

        let mut cleared: Vec<Alert> = expired
            .drain(..)
            .filter_map(|k| self.active.remove(&k))
            .collect();
        cleared.sort_by_key(|a| a.id);

        self.stats.cleared += cleared.len() as u64;
        cleared
            .into_iter()
            .map(|alert| {
                info!(
                    "✓ Alert #{} cleared after {:.2}s silence ({} occurrences)",
                    alert.id,
                    now - alert.last_seen_at,
                    alert.occurrence_count
                );
                FusionEvent::Cleared(alert)
            })
            .collect()
    }

    fn check_starvation(&mut self, now: f64) -> Vec<FusionEvent> {
        let Some(start) = self.started_at else {
            return Vec::new();
        };
        let window = self.config.silence_window_s;

        let mut events = Vec::new();
        for source in AlertSource::ALL {
            let Some(hb) = self.heartbeats.get_mut(&source) else {
                continue;
            };
            let silent_for_s = now - hb.last_seen.unwrap_or(start);
            if !hb.starved && silent_for_s > window {
                hb.starved = true;
                warn!("⚠️  No input from {} for {:.2}s", source, silent_for_s);
                events.push(FusionEvent::SourceStarved {
                    source,
                    silent_for_s,
                });
            }
        }
        events
    }

    /// Join active camera vehicle alerts against active siren alerts.
    fn corroborate(&mut self) -> Vec<FusionEvent> {
        let sirens: Vec<(u64, f64)> = self
            .active
            .values()
            .filter(|a| a.is_siren())
            .map(|a| (a.id, a.last_seen_at))
            .collect();
        if sirens.is_empty() {
            return Vec::new();
        }

        let window = self.config.corroboration_window_s;
        let cap = self.config.corroboration_cap;
        let mut events = Vec::new();

        for alert in self
            .active
            .values_mut()
            .filter(|a| a.is_vehicle() && a.corroborated_by.is_none())
        {
            let Some(&(siren_id, _)) = sirens
                .iter()
                .find(|(_, heard_at)| (alert.last_seen_at - heard_at).abs() <= window)
            else {
                continue;
            };

            alert.corroborated_by = Some(siren_id);
            self.stats.corroborated += 1;

            let previous = alert.level;
            let next = previous.escalated(cap);
            if next > previous {
                alert.level = next;
                self.stats.escalated += 1;
                info!(
                    "🚑 Alert #{} corroborated by siren #{}: {} -> {}",
                    alert.id, siren_id, previous, next
                );
                events.push(FusionEvent::Escalated {
                    alert: alert.clone(),
                    previous,
                    cause: EscalationCause::Corroboration,
                });
            }
        }

        events.sort_by_key(|e| e.alert().map(|a| a.id));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioKind, CameraPosition, LateralZone, ObjectClass};

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default())
    }

    fn car(camera: CameraPosition, level: DangerLevel, t: f64) -> Hazard {
        Hazard {
            key: HazardKey::object(camera, ObjectClass::Car, LateralZone::Center),
            level,
            timestamp: t,
        }
    }

    fn sound(kind: AudioKind, level: DangerLevel, t: f64) -> Hazard {
        Hazard::from_sound(kind, level, t)
    }

    fn count(events: &[FusionEvent], kind: &str) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_first_hazard_creates_alert() {
        let mut e = engine();
        let events = e.apply(car(CameraPosition::Front, DangerLevel::High, 0.0));
        assert_eq!(count(&events, "NEW"), 1);
        let alert = events[0].alert().unwrap();
        assert_eq!(alert.level, DangerLevel::High);
        assert_eq!(alert.source, AlertSource::Front);
        assert_eq!(alert.object_class, Some(ObjectClass::Car));
        assert_eq!(alert.occurrence_count, 1);
        assert_eq!(e.active_count(), 1);
    }

    #[test]
    fn test_repeated_same_level_is_deduplicated() {
        let mut e = engine();
        let n = 30;
        let mut all = Vec::new();
        for i in 0..n {
            all.extend(e.apply(car(CameraPosition::Front, DangerLevel::High, i as f64 / 30.0)));
        }
        assert_eq!(count(&all, "NEW"), 1);
        assert_eq!(all.len(), 1);
        assert_eq!(e.stats().refreshed, n - 1);

        let alert = e.active_alerts()[0].clone();
        assert_eq!(alert.occurrence_count, n as u32);
        assert!((alert.last_seen_at - 29.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_escalates_in_place_and_never_downgrades() {
        let mut e = engine();
        let seq = [
            DangerLevel::Medium,
            DangerLevel::High,
            DangerLevel::Medium,
            DangerLevel::Critical,
            DangerLevel::High,
        ];
        let mut levels = Vec::new();
        let mut escalations = 0;
        for (i, level) in seq.iter().enumerate() {
            let events = e.apply(car(CameraPosition::Rear, *level, i as f64 * 0.1));
            escalations += count(&events, "ESCALATED");
            levels.push(e.active_alerts()[0].level);
        }

        assert_eq!(escalations, 2);
        assert!(levels.windows(2).all(|w| w[1] >= w[0]));
        let alert = &e.active_alerts()[0];
        assert_eq!(alert.level, DangerLevel::Critical);
        assert_eq!(alert.occurrence_count, 5);
        assert_eq!(alert.id, 1);
    }

    #[test]
    fn test_expiry_clears_exactly_once() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::High, 0.0));

        assert!(e.sweep(1.9).iter().all(|ev| ev.kind() != "CLEARED"));
        let events = e.sweep(2.5);
        assert_eq!(count(&events, "CLEARED"), 1);
        assert_eq!(e.active_count(), 0);
        assert_eq!(count(&e.sweep(3.0), "CLEARED"), 0);
        assert_eq!(e.stats().cleared, 1);
    }

    #[test]
    fn test_sweep_ahead_of_input_does_not_make_it_stale() {
        let mut e = engine();
        e.apply(car(CameraPosition::Rear, DangerLevel::Critical, 0.0));

        // Timer runs ahead of a slow input clock
        e.sweep(1.9);
        assert_eq!(e.clock(), Some(0.0));
        for i in 1..20 {
            let t = i as f64 * 0.1;
            assert!(e.apply(car(CameraPosition::Rear, DangerLevel::Critical, t)).is_empty());
            e.sweep(t + 1.9);
        }
        assert_eq!(e.stats().stale_discarded, 0);
        assert_eq!(e.stats().cleared, 0);
        assert_eq!(e.active_alerts()[0].occurrence_count, 20);

        // A sweep far ahead clears, but the next real input is still live
        assert_eq!(count(&e.sweep(10.0), "CLEARED"), 1);
        let events = e.apply(car(CameraPosition::Rear, DangerLevel::Critical, 2.0));
        assert_eq!(count(&events, "NEW"), 1);
        assert_eq!(e.stats().stale_discarded, 0);
    }

    #[test]
    fn test_sweep_before_any_input_is_a_no_op() {
        let mut e = engine();
        assert!(e.sweep(10.0).is_empty());
        assert_eq!(e.clock(), None);
    }

    #[test]
    fn test_after_expiry_a_fresh_lower_alert_is_created() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::Critical, 0.0));
        let events = e.apply(car(CameraPosition::Front, DangerLevel::Medium, 3.0));

        assert_eq!(count(&events, "CLEARED"), 1);
        assert_eq!(count(&events, "NEW"), 1);
        let alert = e.active_alerts()[0].clone();
        assert_eq!(alert.level, DangerLevel::Medium);
        assert_eq!(alert.id, 2);
    }

    #[test]
    fn test_refresh_keeps_alert_alive() {
        let mut e = engine();
        for i in 0..10 {
            e.apply(car(CameraPosition::Front, DangerLevel::High, i as f64 * 1.0));
        }
        assert_eq!(e.active_count(), 1);
        assert_eq!(e.stats().cleared, 0);
    }

    #[test]
    fn test_out_of_order_does_not_move_last_seen_backwards() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::High, 1.0));
        e.apply(car(CameraPosition::Front, DangerLevel::High, 1.5));
        let events = e.apply(car(CameraPosition::Front, DangerLevel::Critical, 1.2));

        assert!(events.is_empty());
        let alert = e.active_alerts()[0].clone();
        assert_eq!(alert.last_seen_at, 1.5);
        assert_eq!(alert.level, DangerLevel::High);
        assert_eq!(alert.occurrence_count, 2);
        assert_eq!(e.stats().stale_discarded, 1);
    }

    #[test]
    fn test_cross_source_lag_is_tolerated() {
        let mut e = engine();
        e.apply(sound(AudioKind::Horn, DangerLevel::High, 5.0));
        // Rear camera runs a little behind the microphone
        let events = e.apply(car(CameraPosition::Rear, DangerLevel::High, 4.6));
        assert_eq!(count(&events, "NEW"), 1);
        assert_eq!(e.active_count(), 2);
    }

    #[test]
    fn test_hazard_from_another_source_is_rejected() {
        let mut e = engine();
        let events = e.ingest(
            AlertSource::Front,
            0.0,
            &[car(CameraPosition::Rear, DangerLevel::High, 0.0)],
        );
        assert!(events.is_empty());
        assert_eq!(e.active_count(), 0);
        assert_eq!(e.stats().rejected, 1);
        let front = e.source_status().into_iter().find(|s| s.source == AlertSource::Front);
        assert_eq!(front.and_then(|s| s.last_seen_at), Some(0.0));
    }

    #[test]
    fn test_low_level_never_enters() {
        let mut e = engine();
        let events = e.apply(car(CameraPosition::Front, DangerLevel::Low, 0.0));
        assert!(events.is_empty());
        assert_eq!(e.active_count(), 0);
        assert_eq!(e.stats().rejected, 1);
    }

    #[test]
    fn test_siren_corroborates_vehicle() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::High, 10.0));
        let events = e.apply(sound(AudioKind::Siren, DangerLevel::Critical, 10.5));

        let escalation = events
            .iter()
            .find_map(|ev| match ev {
                FusionEvent::Escalated {
                    alert,
                    previous,
                    cause: EscalationCause::Corroboration,
                } => Some((alert.clone(), *previous)),
                _ => None,
            })
            .expect("vehicle alert should be corroborated");
        assert_eq!(escalation.1, DangerLevel::High);
        assert_eq!(escalation.0.level, DangerLevel::Critical);
        assert_eq!(escalation.0.source, AlertSource::Front);
        assert!(escalation.0.corroborated_by.is_some());
    }

    #[test]
    fn test_no_corroboration_without_siren() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::High, 10.0));
        e.apply(sound(AudioKind::Horn, DangerLevel::High, 10.2));
        e.apply(car(CameraPosition::Front, DangerLevel::High, 10.4));

        let front = e
            .active_alerts()
            .into_iter()
            .find(|a| a.source == AlertSource::Front)
            .unwrap();
        assert_eq!(front.level, DangerLevel::High);
    }

    #[test]
    fn test_corroboration_respects_window() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::Medium, 10.0));
        e.apply(sound(AudioKind::Siren, DangerLevel::Critical, 11.5));
        let front = e.active_alert(&HazardKey::object(
            CameraPosition::Front,
            ObjectClass::Car,
            LateralZone::Center,
        ));
        assert_eq!(front.unwrap().level, DangerLevel::Medium);

        // A fresh sighting inside the window joins
        let events = e.apply(car(CameraPosition::Front, DangerLevel::Medium, 11.6));
        assert_eq!(count(&events, "ESCALATED"), 1);
    }

    #[test]
    fn test_corroboration_applies_once_and_respects_cap() {
        let config = FusionConfig {
            corroboration_cap: DangerLevel::High,
            ..FusionConfig::default()
        };
        let mut e = FusionEngine::new(config);
        e.apply(car(CameraPosition::Rear, DangerLevel::Medium, 0.0));
        e.apply(sound(AudioKind::Siren, DangerLevel::Critical, 0.1));
        for i in 1..10 {
            e.apply(car(CameraPosition::Rear, DangerLevel::Medium, i as f64 * 0.1));
            e.apply(sound(AudioKind::Siren, DangerLevel::Critical, i as f64 * 0.1 + 0.05));
        }
        let rear = e
            .active_alerts()
            .into_iter()
            .find(|a| a.source == AlertSource::Rear)
            .unwrap();
        assert_eq!(rear.level, DangerLevel::High);
        assert_eq!(e.stats().corroborated, 1);
    }

    #[test]
    fn test_pedestrians_are_not_corroborated() {
        let mut e = engine();
        e.apply(Hazard {
            key: HazardKey::object(CameraPosition::Front, ObjectClass::Person, LateralZone::Left),
            level: DangerLevel::High,
            timestamp: 0.0,
        });
        e.apply(sound(AudioKind::Siren, DangerLevel::Critical, 0.2));
        let person = e
            .active_alerts()
            .into_iter()
            .find(|a| a.object_class == Some(ObjectClass::Person))
            .unwrap();
        assert_eq!(person.level, DangerLevel::High);
    }

    #[test]
    fn test_starvation_and_recovery() {
        let mut e = engine();
        e.ingest(AlertSource::Front, 0.0, &[]);
        e.ingest(AlertSource::Rear, 0.0, &[]);
        e.ingest(AlertSource::Audio, 0.0, &[]);

        // Front and audio keep talking, rear goes quiet
        let mut events = Vec::new();
        for i in 1..=30 {
            let t = i as f64 * 0.1;
            events.extend(e.ingest(AlertSource::Front, t, &[]));
            events.extend(e.ingest(AlertSource::Audio, t, &[]));
        }
        let starved: Vec<_> = events
            .iter()
            .filter_map(|ev| match ev {
                FusionEvent::SourceStarved { source, .. } => Some(*source),
                _ => None,
            })
            .collect();
        assert_eq!(starved, vec![AlertSource::Rear]);
        assert!(e.source_status().iter().any(|s| s.source == AlertSource::Rear && s.starved));

        let events = e.ingest(AlertSource::Rear, 3.1, &[]);
        assert_eq!(count(&events, "SOURCE_RECOVERED"), 1);
        assert!(e.source_status().iter().all(|s| !s.starved));
    }

    #[test]
    fn test_healthy_sources_alert_while_one_is_starved() {
        let mut e = engine();
        for i in 0..40 {
            e.apply(car(CameraPosition::Front, DangerLevel::High, i as f64 * 0.1));
        }
        assert_eq!(e.active_count(), 1);
        assert!(e
            .source_status()
            .iter()
            .any(|s| s.source == AlertSource::Rear && s.starved));
    }

    #[test]
    fn test_active_alerts_ordered_by_severity() {
        let mut e = engine();
        e.apply(car(CameraPosition::Front, DangerLevel::Medium, 0.0));
        e.apply(sound(AudioKind::Horn, DangerLevel::High, 0.1));
        e.apply(car(CameraPosition::Rear, DangerLevel::Critical, 0.2));
        let levels: Vec<_> = e.active_alerts().iter().map(|a| a.level).collect();
        assert_eq!(
            levels,
            vec![DangerLevel::Critical, DangerLevel::High, DangerLevel::Medium]
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(FusionConfig::default().validate().is_ok());
        let bad = FusionConfig {
            corroboration_window_s: -1.0,
            ..FusionConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::NonPositiveWindow { .. })));
        let low_cap = FusionConfig {
            corroboration_cap: DangerLevel::Low,
            ..FusionConfig::default()
        };
        assert!(low_cap.validate().is_err());
    }
}
