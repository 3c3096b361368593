use serde::{Deserialize, Serialize};

use crate::data::peak::DetectedPeak;
use crate::utility::parse_numeric;

/// Default size-exclusion mass standards as (label, mass in Da, expected
/// retention time in minutes), listed in elution order.
pub const SEC_MASS_STANDARDS: [(&str, f64, f64); 5] = [
    ("Thyroglobulin", 660_000.0, 7.11),
    ("IgG", 150_000.0, 8.95),
    ("BSA", 66_400.0, 10.1),
    ("Myoglobin", 17_000.0, 12.23),
    ("Uracil", 112.0, 16.0),
];

/// pI values assigned to the isoelectric-focusing boundary standards in
/// elution order: two ahead of the sample window, two behind it.
pub const CIEF_BOUNDARY_PI: [f64; 4] = [10.0, 9.5, 5.5, 4.0];

/// A reference standard with a known property value (mass in Da or pI).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStandard {
    pub label: String,
    /// Known property value.
    pub value: f64,
    /// Expected retention time in minutes, where the method defines one.
    pub expected_time: Option<f64>,
}

impl ReferenceStandard {
    pub fn new(label: impl Into<String>, value: f64, expected_time: Option<f64>) -> Self {
        ReferenceStandard {
            label: label.into(),
            value,
            expected_time,
        }
    }

    /// The built-in size-exclusion standard set.
    pub fn sec_defaults() -> Vec<ReferenceStandard> {
        SEC_MASS_STANDARDS
            .iter()
            .map(|&(label, value, time)| ReferenceStandard::new(label, value, Some(time)))
            .collect()
    }

    /// Parses a (label, value, expected time) string table from an external
    /// store. Rows without a parsable value are dropped; an unparsable
    /// expected time degrades to `None` rather than to a fake number.
    pub fn parse_table(rows: &[(&str, &str, &str)]) -> Vec<ReferenceStandard> {
        rows.iter()
            .filter_map(|&(label, value, time)| {
                let value = parse_numeric(value)?;
                Some(ReferenceStandard::new(label, value, parse_numeric(time)))
            })
            .collect()
    }
}

/// Transform applied to the property value before the linear fit. Masses are
/// regressed in log space, pI values linearly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainTransform {
    Log,
    Linear,
}

impl DomainTransform {
    pub fn forward(&self, value: f64) -> f64 {
        match self {
            DomainTransform::Log => value.ln(),
            DomainTransform::Linear => value,
        }
    }

    pub fn inverse(&self, value: f64) -> f64 {
        match self {
            DomainTransform::Log => value.exp(),
            DomainTransform::Linear => value,
        }
    }
}

/// A standard paired with the detected peak that represents it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub standard: ReferenceStandard,
    pub peak: DetectedPeak,
}

/// A fitted retention-time-to-property calibration line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub slope: f64,
    pub intercept: f64,
    pub transform: DomainTransform,
    pub r_squared: f64,
    /// The pairs the line was fitted on, in matching order.
    pub pairs: Vec<MatchedPair>,
}

impl CalibrationModel {
    /// Estimates the property value at a retention time.
    ///
    /// Times outside the matched standards' range are not clamped; the value
    /// is still computed but the extrapolation is logged.
    pub fn estimate(&self, time: f64) -> f64 {
        if let Some((lo, hi)) = self.time_range() {
            if time < lo || time > hi {
                log::warn!(
                    "estimating at {:.3} min, outside the calibrated range {:.3}-{:.3} min",
                    time,
                    lo,
                    hi
                );
            }
        }
        self.transform.inverse(self.slope * time + self.intercept)
    }

    /// Retention-time span of the matched standards.
    fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.pairs.first()?.peak.apex_time;
        let (lo, hi) = self
            .pairs
            .iter()
            .fold((first, first), |(lo, hi), pair| {
                (lo.min(pair.peak.apex_time), hi.max(pair.peak.apex_time))
            });
        Some((lo, hi))
    }
}
