//! Unit normalization for joint quantities.
//!
//! Angular joints are recorded in degrees or radians, prismatic axes in millimeters or
//! meters. A [`UnitConversion`] is only constructible between units of the same
//! dimension, so applying it never has to fail.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const DEG_TO_RAD: f64 = PI / 180.0;
pub const MM_TO_M: f64 = 0.001;

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * DEG_TO_RAD
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad / DEG_TO_RAD
}

pub fn mm_to_m(mm: f64) -> f64 {
    mm * MM_TO_M
}

pub fn m_to_mm(m: f64) -> f64 {
    m / MM_TO_M
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitDimension {
    Angle,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointUnit {
    #[serde(alias = "degrees")]
    Deg,
    #[serde(alias = "radians")]
    Rad,
    #[serde(alias = "millimeters")]
    Mm,
    #[serde(alias = "meters")]
    M,
}

impl JointUnit {
    pub fn dimension(self) -> UnitDimension {
        match self {
            JointUnit::Deg | JointUnit::Rad => UnitDimension::Angle,
            JointUnit::Mm | JointUnit::M => UnitDimension::Length,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JointUnit::Deg => "deg",
            JointUnit::Rad => "rad",
            JointUnit::Mm => "mm",
            JointUnit::M => "m",
        }
    }
}

/// Conversion from a recorded unit to the dataset's output unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitConversion {
    from: JointUnit,
    to: JointUnit,
}

impl UnitConversion {
    /// Returns `None` when the units measure different dimensions (e.g. deg -> m).
    pub fn between(from: JointUnit, to: JointUnit) -> Option<Self> {
        if from.dimension() != to.dimension() {
            return None;
        }
        Some(Self { from, to })
    }

    pub fn from_unit(&self) -> JointUnit {
        self.from
    }

    pub fn to_unit(&self) -> JointUnit {
        self.to
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn apply(&self, value: f64) -> f64 {
        match (self.from, self.to) {
            (JointUnit::Deg, JointUnit::Rad) => deg_to_rad(value),
            (JointUnit::Rad, JointUnit::Deg) => rad_to_deg(value),
            (JointUnit::Mm, JointUnit::M) => mm_to_m(value),
            (JointUnit::M, JointUnit::Mm) => m_to_mm(value),
            _ => value,
        }
    }

    pub fn apply_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.apply(*v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deg_to_rad_known_values() {
        assert!((deg_to_rad(180.0) - PI).abs() < 1e-12);
        assert!((deg_to_rad(90.0) - PI / 2.0).abs() < 1e-12);
        assert_eq!(deg_to_rad(0.0), 0.0);
    }

    #[test]
    fn test_angle_round_trip() {
        for x in [-720.5, -90.0, -1e-9, 0.0, 33.3, 359.99, 12345.678] {
            assert!((rad_to_deg(deg_to_rad(x)) - x).abs() < 1e-9 * x.abs().max(1.0));
        }
    }

    #[test]
    fn test_length_round_trip() {
        for x in [-1500.0, 0.0, 0.25, 42.0, 1e6] {
            assert!((m_to_mm(mm_to_m(x)) - x).abs() < 1e-9 * x.abs().max(1.0));
        }
        assert!((mm_to_m(250.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_conversion_rejects_mixed_dimensions() {
        assert!(UnitConversion::between(JointUnit::Deg, JointUnit::M).is_none());
        assert!(UnitConversion::between(JointUnit::Mm, JointUnit::Rad).is_none());
        assert!(UnitConversion::between(JointUnit::Mm, JointUnit::M).is_some());
    }

    #[test]
    fn test_identity_conversion_passes_through() {
        let conv = UnitConversion::between(JointUnit::Rad, JointUnit::Rad).unwrap();
        assert!(conv.is_identity());
        assert_eq!(conv.apply_all(&[1.5, -2.0]), vec![1.5, -2.0]);
    }

    #[test]
    fn test_unit_serde_names() {
        let u: JointUnit = serde_json::from_str("\"deg\"").unwrap();
        assert_eq!(u, JointUnit::Deg);
        let u: JointUnit = serde_json::from_str("\"radians\"").unwrap();
        assert_eq!(u, JointUnit::Rad);
        assert_eq!(serde_json::to_string(&JointUnit::Mm).unwrap(), "\"mm\"");
    }
}
