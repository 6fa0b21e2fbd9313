// src/fusion/alert.rs

use crate::types::{
    AlertSource, AudioKind, CameraPosition, DangerLevel, LateralZone, ObjectClass, Observation,
};
use serde::Serialize;

// ============================================================================
// KEYS
// ============================================================================

/// The spatial or frequency bucket a hazard belongs to within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HazardBucket {
    Object {
        class: ObjectClass,
        zone: LateralZone,
    },
    Sound(AudioKind),
}

/// Identity of a hazard across frames: one active alert per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HazardKey {
    pub source: AlertSource,
    pub bucket: HazardBucket,
}

impl HazardKey {
    pub fn object(camera: CameraPosition, class: ObjectClass, zone: LateralZone) -> Self {
        Self {
            source: camera.into(),
            bucket: HazardBucket::Object { class, zone },
        }
    }

    pub fn sound(kind: AudioKind) -> Self {
        Self {
            source: AlertSource::Audio,
            bucket: HazardBucket::Sound(kind),
        }
    }

    pub fn label(&self) -> String {
        match self.bucket {
            HazardBucket::Object { class, zone } => {
                format!("{}/{}/{}", self.source, class.as_str(), zone.as_str())
            }
            HazardBucket::Sound(kind) => format!("{}/{}", self.source, kind.as_str()),
        }
    }
}

/// One classified hazard ready for fusion (level >= MEDIUM by construction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hazard {
    pub key: HazardKey,
    pub level: DangerLevel,
    pub timestamp: f64,
}

impl Hazard {
    pub fn from_observation(obs: &Observation, level: DangerLevel) -> Self {
        Self {
            key: HazardKey::object(obs.source, obs.object_class, obs.lateral_zone()),
            level,
            timestamp: obs.timestamp,
        }
    }

    pub fn from_sound(kind: AudioKind, level: DangerLevel, timestamp: f64) -> Self {
        Self {
            key: HazardKey::sound(kind),
            level,
            timestamp,
        }
    }
}

// ============================================================================
// ALERT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: u64,
    pub key: HazardKey,
    pub source: AlertSource,
    pub level: DangerLevel,
    pub object_class: Option<ObjectClass>,
    pub audio_kind: Option<AudioKind>,
    pub created_at: f64,
    pub last_seen_at: f64,
    pub occurrence_count: u32,
    /// Id of the siren alert that corroborated this one, if any
    pub corroborated_by: Option<u64>,
}

impl Alert {
    pub(crate) fn open(id: u64, hazard: &Hazard) -> Self {
        let (object_class, audio_kind) = match hazard.key.bucket {
            HazardBucket::Object { class, .. } => (Some(class), None),
            HazardBucket::Sound(kind) => (None, Some(kind)),
        };
        Self {
            id,
            key: hazard.key,
            source: hazard.key.source,
            level: hazard.level,
            object_class,
            audio_kind,
            created_at: hazard.timestamp,
            last_seen_at: hazard.timestamp,
            occurrence_count: 1,
            corroborated_by: None,
        }
    }

    pub fn is_siren(&self) -> bool {
        self.audio_kind == Some(AudioKind::Siren)
    }

    pub fn is_vehicle(&self) -> bool {
        self.source.is_camera()
            && self
                .object_class
                .map(|c| c.is_motor_vehicle())
                .unwrap_or(false)
    }

    pub fn describe(&self) -> String {
        match (self.object_class, self.audio_kind) {
            (Some(class), _) => format!(
                "{} {} {} from {}",
                self.level,
                class.as_str(),
                zone_of(&self.key).map(|z| z.as_str()).unwrap_or(""),
                self.source
            ),
            (None, Some(kind)) => format!("{} {} heard", self.level, kind.as_str()),
            (None, None) => format!("{} hazard from {}", self.level, self.source),
        }
    }
}

fn zone_of(key: &HazardKey) -> Option<LateralZone> {
    match key.bucket {
        HazardBucket::Object { zone, .. } => Some(zone),
        HazardBucket::Sound(_) => None,
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscalationCause {
    /// A more severe observation of the same hazard
    Observation,
    /// A siren was active within the corroboration window
    Corroboration,
}

/// Lifecycle transitions the engine reports. Refreshes of an unchanged
/// hazard are deliberately not events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FusionEvent {
    New(Alert),
    Escalated {
        alert: Alert,
        previous: DangerLevel,
        cause: EscalationCause,
    },
    Cleared(Alert),
    SourceStarved {
        source: AlertSource,
        silent_for_s: f64,
    },
    SourceRecovered {
        source: AlertSource,
    },
}

impl FusionEvent {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            FusionEvent::New(alert)
            | FusionEvent::Escalated { alert, .. }
            | FusionEvent::Cleared(alert) => Some(alert),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FusionEvent::New(_) => "NEW",
            FusionEvent::Escalated { .. } => "ESCALATED",
            FusionEvent::Cleared(_) => "CLEARED",
            FusionEvent::SourceStarved { .. } => "SOURCE_STARVED",
            FusionEvent::SourceRecovered { .. } => "SOURCE_RECOVERED",
        }
    }
}
