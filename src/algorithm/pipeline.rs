use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::calibration::{build_boundary_calibration, build_mass_calibration};
use crate::algorithm::classification::{
    classify_mass_exclusion, classify_ordinal_boundary, sample_window,
};
use crate::algorithm::detection::detect_peaks;
use crate::data::calibration::{CalibrationModel, ReferenceStandard};
use crate::data::chromatogram::Chromatogram;
use crate::data::classification::SpeciesClassification;
use crate::data::config::{AnalysisConfiguration, MassExclusionConfig, OrdinalBoundaryConfig};
use crate::data::peak::DetectedPeak;
use crate::error::AnalysisError;

/// Everything the reporting layer needs for one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Peaks in elution order; for boundary-bracketed runs these are the
    /// sample-window peaks only.
    pub peaks: Vec<DetectedPeak>,
    pub calibration: Option<CalibrationModel>,
    pub classification: SpeciesClassification,
}

/// Full mass-exclusion analysis of one sample.
///
/// A failed or absent reference calibration degrades to estimates of `None`;
/// a sample with no classifiable peaks yields the unavailable classification.
/// Only a defective sample trace or configuration is an error.
pub fn analyze_mass_exclusion(
    sample: &Chromatogram,
    reference: Option<&Chromatogram>,
    standards: &[ReferenceStandard],
    detection: &AnalysisConfiguration,
    policy: &MassExclusionConfig,
) -> Result<AnalysisReport, AnalysisError> {
    let calibration = reference.and_then(|r| {
        match build_mass_calibration(r, standards, detection) {
            Ok(model) => Some(model),
            Err(e) => {
                log::warn!("mass calibration unavailable: {}", e);
                None
            }
        }
    });
    analyze_with_calibration(sample, calibration, detection, policy)
}

fn analyze_with_calibration(
    sample: &Chromatogram,
    calibration: Option<CalibrationModel>,
    detection: &AnalysisConfiguration,
    policy: &MassExclusionConfig,
) -> Result<AnalysisReport, AnalysisError> {
    let peaks = detect_peaks(sample, detection)?;
    let classification = classify_mass_exclusion(&peaks, policy, calibration.as_ref());
    Ok(AnalysisReport {
        peaks,
        calibration,
        classification,
    })
}

/// Full ordinal-boundary analysis of one isoelectric-focusing run. The
/// boundary standards come from the run itself, so no separate reference is
/// needed.
///
/// Missing boundaries or an unresolvable sample window degrade to an
/// unavailable classification rather than an error.
pub fn analyze_ordinal_boundary(
    sample: &Chromatogram,
    detection: &AnalysisConfiguration,
    policy: &OrdinalBoundaryConfig,
) -> Result<AnalysisReport, AnalysisError> {
    let (boundaries, calibration) =
        match build_boundary_calibration(sample, detection, policy) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("boundary calibration unavailable: {}", e);
                return Ok(AnalysisReport {
                    peaks: Vec::new(),
                    calibration: None,
                    classification: SpeciesClassification::unavailable(),
                });
            }
        };

    let run_end = sample.time.last().copied().unwrap_or(0.0);
    let (start, end) = match sample_window(&boundaries, run_end, policy) {
        Ok(window) => window,
        Err(e) => {
            log::warn!("sample window unavailable: {}", e);
            return Ok(AnalysisReport {
                peaks: Vec::new(),
                calibration: Some(calibration),
                classification: SpeciesClassification::unavailable(),
            });
        }
    };

    let window_config = AnalysisConfiguration {
        region_start: Some(start),
        region_end: Some(end),
        ..detection.clone()
    };
    let peaks = match detect_peaks(sample, &window_config) {
        Ok(peaks) => peaks,
        Err(AnalysisError::InsufficientData { .. }) => Vec::new(),
        Err(e) => return Err(e),
    };
    let classification = classify_ordinal_boundary(&peaks, policy, Some(&calibration));
    Ok(AnalysisReport {
        peaks,
        calibration: Some(calibration),
        classification,
    })
}

/// Analyzes a batch of independent mass-exclusion samples in parallel.
///
/// The reference calibration is built once and shared; each invocation is
/// stateless, so samples simply fan out across the rayon pool. Result order
/// matches input order.
pub fn analyze_batch(
    samples: &[Chromatogram],
    reference: Option<&Chromatogram>,
    standards: &[ReferenceStandard],
    detection: &AnalysisConfiguration,
    policy: &MassExclusionConfig,
) -> Vec<Result<AnalysisReport, AnalysisError>> {
    let calibration = reference.and_then(|r| {
        match build_mass_calibration(r, standards, detection) {
            Ok(model) => Some(model),
            Err(e) => {
                log::warn!("mass calibration unavailable: {}", e);
                None
            }
        }
    });
    samples
        .par_iter()
        .map(|sample| analyze_with_calibration(sample, calibration.clone(), detection, policy))
        .collect()
}
