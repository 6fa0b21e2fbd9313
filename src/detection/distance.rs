// src/detection/distance.rs
//
// Apparent size -> ordinal proximity band.
//
// Larger normalized box area means closer. The calibration is per class
// because a truck fills more of the frame than a car at the same range.
// Only the ordering of bands is promised, not metres.

use crate::error::ConfigError;
use crate::types::{DistanceBand, ObjectClass};
use serde::{Deserialize, Serialize};

/// Minimum box area (fraction of frame) for each band. Anything below
/// `near` is FAR. Must satisfy `1 >= very_close > close > near > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    pub very_close: f32,
    pub close: f32,
    pub near: f32,
}

impl BandThresholds {
    pub const fn new(very_close: f32, close: f32, near: f32) -> Self {
        Self {
            very_close,
            close,
            near,
        }
    }

    fn validate(&self, class: ObjectClass) -> Result<(), ConfigError> {
        let ordered = self.very_close <= 1.0
            && self.very_close > self.close
            && self.close > self.near
            && self.near > 0.0;
        if !ordered {
            return Err(ConfigError::NonMonotonicBands {
                class: class.as_str(),
                very_close: self.very_close,
                close: self.close,
                near: self.near,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceCalibration {
    pub car: BandThresholds,
    pub truck: BandThresholds,
    pub bus: BandThresholds,
    pub motorcycle: BandThresholds,
    pub bicycle: BandThresholds,
    pub person: BandThresholds,
    pub unknown: BandThresholds,
}

impl Default for DistanceCalibration {
    fn default() -> Self {
        Self {
            car: BandThresholds::new(0.35, 0.20, 0.10),
            truck: BandThresholds::new(0.50, 0.30, 0.15),
            bus: BandThresholds::new(0.50, 0.30, 0.15),
            motorcycle: BandThresholds::new(0.20, 0.12, 0.05),
            bicycle: BandThresholds::new(0.18, 0.10, 0.04),
            person: BandThresholds::new(0.15, 0.08, 0.03),
            unknown: BandThresholds::new(0.35, 0.20, 0.10),
        }
    }
}

impl DistanceCalibration {
    pub fn thresholds(&self, class: ObjectClass) -> &BandThresholds {
        match class {
            ObjectClass::Car => &self.car,
            ObjectClass::Truck => &self.truck,
            ObjectClass::Bus => &self.bus,
            ObjectClass::Motorcycle => &self.motorcycle,
            ObjectClass::Bicycle => &self.bicycle,
            ObjectClass::Person => &self.person,
            ObjectClass::Unknown => &self.unknown,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in ObjectClass::ALL {
            self.thresholds(class).validate(class)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    calibration: DistanceCalibration,
}

impl DistanceEstimator {
    pub fn new(calibration: DistanceCalibration) -> Self {
        Self { calibration }
    }

    /// Most severe band whose area threshold is met. Area outside (0, 1]
    /// is clamped first; NaN counts as the smallest possible box.
    pub fn estimate(&self, class: ObjectClass, box_area: f32) -> DistanceBand {
        let area = clamp_area(box_area);
        let t = self.calibration.thresholds(class);

        if area >= t.very_close {
            DistanceBand::VeryClose
        } else if area >= t.close {
            DistanceBand::Close
        } else if area >= t.near {
            DistanceBand::Near
        } else {
            DistanceBand::Far
        }
    }
}

fn clamp_area(area: f32) -> f32 {
    if area.is_nan() {
        return f32::MIN_POSITIVE;
    }
    area.clamp(f32::MIN_POSITIVE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> DistanceEstimator {
        DistanceEstimator::new(DistanceCalibration::default())
    }

    #[test]
    fn test_larger_area_never_farther() {
        let e = estimator();
        for class in ObjectClass::ALL {
            let mut previous = DistanceBand::Far;
            for step in 0..=1000 {
                let area = step as f32 / 1000.0;
                let band = e.estimate(class, area);
                assert!(
                    band >= previous,
                    "{:?}: area {} gave {:?} after {:?}",
                    class,
                    area,
                    band,
                    previous
                );
                previous = band;
            }
        }
    }

    #[test]
    fn test_class_calibration_differs() {
        let e = estimator();
        // Same apparent size reads closer for a car than for a truck
        assert!(e.estimate(ObjectClass::Car, 0.36) > e.estimate(ObjectClass::Truck, 0.36));
    }

    #[test]
    fn test_car_scenarios() {
        let e = estimator();
        assert_eq!(e.estimate(ObjectClass::Car, 0.01), DistanceBand::Far);
        assert_eq!(e.estimate(ObjectClass::Car, 0.35), DistanceBand::VeryClose);
        assert_eq!(e.estimate(ObjectClass::Car, 0.25), DistanceBand::Close);
    }

    #[test]
    fn test_out_of_range_area_is_clamped() {
        let e = estimator();
        assert_eq!(e.estimate(ObjectClass::Car, 4.0), DistanceBand::VeryClose);
        assert_eq!(e.estimate(ObjectClass::Car, -1.0), DistanceBand::Far);
        assert_eq!(e.estimate(ObjectClass::Car, 0.0), DistanceBand::Far);
        assert_eq!(e.estimate(ObjectClass::Car, f32::NAN), DistanceBand::Far);
        assert_eq!(e.estimate(ObjectClass::Car, f32::INFINITY), DistanceBand::VeryClose);
    }

    #[test]
    fn test_validation_rejects_equal_thresholds() {
        let mut cal = DistanceCalibration::default();
        cal.bus = BandThresholds::new(0.3, 0.3, 0.1);
        assert!(matches!(
            cal.validate(),
            Err(ConfigError::NonMonotonicBands { class: "bus", .. })
        ));
    }
}
