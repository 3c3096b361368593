use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Configuration for peak detection and integration.
///
/// Defaults match the instrument methods the pipeline was tuned on; every
/// field can be overridden per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfiguration {
    /// Savitzky-Golay window length in samples, odd and at least 3
    /// (default: 11). Clamped down for short traces.
    pub smoothing_window: usize,
    /// Savitzky-Golay polynomial order (default: 3).
    pub smoothing_polyorder: usize,
    /// Minimum prominence for a candidate apex (default: 1.0).
    pub prominence_threshold: f64,
    /// Minimum separation between apexes in minutes (default: 0.3).
    pub min_peak_separation: f64,
    /// How far to search for valleys on each side of an apex, in minutes
    /// (default: 3.0).
    pub valley_search_window: f64,
    /// Both valleys must fall below `apex_height * (1 - ratio)` (default: 0.2).
    pub valley_drop_ratio: f64,
    /// Keep at most this many candidates, tallest first (default: 10).
    pub max_peaks: usize,
    /// Detect only at retention times at or after this cutoff.
    pub region_start: Option<f64>,
    /// Detect only at retention times at or before this cutoff.
    pub region_end: Option<f64>,
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        AnalysisConfiguration {
            smoothing_window: 11,
            smoothing_polyorder: 3,
            prominence_threshold: 1.0,
            min_peak_separation: 0.3,
            valley_search_window: 3.0,
            valley_drop_ratio: 0.2,
            max_peaks: 10,
            region_start: None,
            region_end: None,
        }
    }
}

impl AnalysisConfiguration {
    /// Checks the structural invariants the detector relies on.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.smoothing_window < 3 || self.smoothing_window % 2 == 0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "smoothing window must be odd and at least 3, got {}",
                self.smoothing_window
            )));
        }
        if self.smoothing_polyorder >= self.smoothing_window {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "polynomial order {} must be below the window length {}",
                self.smoothing_polyorder, self.smoothing_window
            )));
        }
        if self.prominence_threshold <= 0.0 {
            return Err(AnalysisError::InvalidConfiguration(
                "prominence threshold must be positive".to_string(),
            ));
        }
        if self.min_peak_separation < 0.0 || self.valley_search_window <= 0.0 {
            return Err(AnalysisError::InvalidConfiguration(
                "separation and valley window must be non-negative minutes".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.valley_drop_ratio) {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "valley drop ratio must lie in [0, 1], got {}",
                self.valley_drop_ratio
            )));
        }
        if self.max_peaks == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "max peaks must be at least 1".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.region_start, self.region_end) {
            if end <= start {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "region {:.2}-{:.2} min is empty",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for the mass-exclusion classification policy used on
/// size-exclusion runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassExclusionConfig {
    /// Expected main peak retention time in minutes (default: 7.84, the
    /// monomer elution time of the reference method).
    pub main_peak_time: f64,
    /// Peaks eluting after this time are excluded from the LMW bin and from
    /// the total (default: 12.0).
    pub low_mw_cutoff: f64,
    /// Smallest reliably integrable area on the instrument scale. When set,
    /// a bin holding 100% of the area is reported as a `>X%` floor expression
    /// instead (default: 1000).
    pub detection_floor_area: Option<f64>,
}

impl Default for MassExclusionConfig {
    fn default() -> Self {
        MassExclusionConfig {
            main_peak_time: 7.84,
            low_mw_cutoff: 12.0,
            detection_floor_area: Some(1000.0),
        }
    }
}

/// Which retention time the calibration is evaluated at for a sample peak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApexMode {
    /// The smoothed apex position.
    ApexTime,
    /// The area-weighted retention time of the integration span.
    WeightedTime,
}

/// Configuration for the ordinal-boundary classification policy used on
/// isoelectric-focusing runs, where the standards bracket the sample window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrdinalBoundaryConfig {
    /// Boundary standards elute only after this time (default: 12.0).
    pub boundary_start_cutoff: f64,
    /// Trailing boundary standards elute after this time (default: 30.0).
    pub boundary_end_cutoff: f64,
    /// Prominence used when detecting boundary standards, which sit well
    /// above the sample peaks (default: 7000).
    pub boundary_prominence: f64,
    /// Valley search window for boundary standards in minutes (default: 1.0).
    pub boundary_valley_window: f64,
    /// Sample window opens this long after the second front standard's end
    /// (default: 0.25).
    pub window_lead_pad: f64,
    /// Sample window closes this long before the first back standard's start
    /// (default: 1.0).
    pub window_tail_pad: f64,
    /// Apex definition used for property estimation (default: `ApexTime`).
    pub apex_mode: ApexMode,
}

impl Default for OrdinalBoundaryConfig {
    fn default() -> Self {
        OrdinalBoundaryConfig {
            boundary_start_cutoff: 12.0,
            boundary_end_cutoff: 30.0,
            boundary_prominence: 7000.0,
            boundary_valley_window: 1.0,
            window_lead_pad: 0.25,
            window_tail_pad: 1.0,
            apex_mode: ApexMode::ApexTime,
        }
    }
}
