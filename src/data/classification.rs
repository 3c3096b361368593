use std::fmt;

use serde::{Deserialize, Serialize};

/// Species bins reported by the classifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Hmw,
    MainPeak,
    Lmw,
    LightChain,
    HeavyChain,
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Species::Hmw => "HMW",
            Species::MainPeak => "Main Peak",
            Species::Lmw => "LMW",
            Species::LightChain => "Light Chain",
            Species::HeavyChain => "Heavy Chain",
        };
        write!(f, "{}", label)
    }
}

/// Percent of total classified area. `GreaterThan` is the quantitation-floor
/// form: the bin holds everything measurable, but species below the floor
/// could hide in the baseline, so only a lower bound is reported.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Percent {
    Exact(f64),
    GreaterThan(f64),
}

impl Percent {
    pub fn value(&self) -> f64 {
        match self {
            Percent::Exact(v) | Percent::GreaterThan(v) => *v,
        }
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percent::Exact(v) => write!(f, "{:.2}", v),
            Percent::GreaterThan(v) => write!(f, ">{:.2}", v),
        }
    }
}

/// One classified region of the chromatogram. Pooled bins (HMW, LMW) span all
/// their member peaks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesBin {
    pub species: Species,
    pub area: f64,
    pub percent: Percent,
    pub start_time: f64,
    pub end_time: f64,
    /// Mass or pI from the calibration, when one is available.
    pub estimated_property: Option<f64>,
}

/// Classification result with bins in elution order. An empty result means
/// the sample could not be classified; callers render it as unavailable and
/// move on to the next sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesClassification {
    pub bins: Vec<SpeciesBin>,
    /// Total classified area the percentages are relative to.
    pub total_area: f64,
}

impl SpeciesClassification {
    pub fn unavailable() -> Self {
        SpeciesClassification::default()
    }

    pub fn is_unavailable(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn get(&self, species: Species) -> Option<&SpeciesBin> {
        self.bins.iter().find(|bin| bin.species == species)
    }

    /// Sum of the reported percentages, floor expressions included at their
    /// bound value.
    pub fn percent_total(&self) -> f64 {
        self.bins.iter().map(|bin| bin.percent.value()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_labels() {
        assert_eq!(Species::Hmw.to_string(), "HMW");
        assert_eq!(Species::MainPeak.to_string(), "Main Peak");
        assert_eq!(Species::LightChain.to_string(), "Light Chain");
    }

    #[test]
    fn test_percent_display() {
        assert_eq!(Percent::Exact(98.765).to_string(), "98.77");
        assert_eq!(Percent::GreaterThan(99.2).to_string(), ">99.20");
    }

    #[test]
    fn test_unavailable_classification() {
        let c = SpeciesClassification::unavailable();
        assert!(c.is_unavailable());
        assert_eq!(c.get(Species::MainPeak), None);
        assert!(c.percent_total().abs() < 1e-12);
    }
}
