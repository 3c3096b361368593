use std::cmp::Reverse;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::algorithm::detection::{detect_peaks, MIN_TRACE_LEN};
use crate::data::calibration::{
    CalibrationModel, DomainTransform, MatchedPair, ReferenceStandard, CIEF_BOUNDARY_PI,
};
use crate::data::chromatogram::Chromatogram;
use crate::data::config::{AnalysisConfiguration, OrdinalBoundaryConfig};
use crate::data::peak::DetectedPeak;
use crate::error::AnalysisError;

/// Default nearest-match tolerance in minutes.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.75;

/// Nearest-time matching must claim at least this many standards before it is
/// trusted; below that the builder switches to rank-based assignment.
pub const MIN_NEAREST_MATCHES: usize = 3;

/// Boundary standards expected on each side of the sample window.
const BOUNDARY_PEAKS_PER_SIDE: usize = 2;

/// How detected peaks were paired with reference standards. The strategy is
/// chosen by an up-front precondition on the nearest-time match count, not by
/// error recovery.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Each standard claims the nearest unclaimed peak within the tolerance.
    NearestTime { tolerance: f64 },
    /// Top peaks by area, re-sorted by elution, labelled positionally.
    RankByArea { top_k: usize },
}

/// Pairs each standard that carries an expected time with the nearest
/// unclaimed peak, skipping pairs outside the tolerance. Standards claim
/// peaks in table order, so an earlier standard can take a peak a later one
/// would also want.
pub fn match_nearest_time(
    standards: &[ReferenceStandard],
    peaks: &[DetectedPeak],
    tolerance: f64,
) -> Vec<MatchedPair> {
    let mut claimed = vec![false; peaks.len()];
    let mut pairs = Vec::new();
    for standard in standards {
        let Some(expected) = standard.expected_time else {
            continue;
        };
        let nearest = peaks
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .min_by_key(|(_, p)| OrderedFloat((p.apex_time - expected).abs()));
        if let Some((i, peak)) = nearest {
            if (peak.apex_time - expected).abs() <= tolerance {
                claimed[i] = true;
                pairs.push(MatchedPair {
                    standard: standard.clone(),
                    peak: peak.clone(),
                });
            }
        }
    }
    pairs
}

/// Takes the `top_k` peaks by area, re-sorts them by elution time and assigns
/// the standards positionally. The standards slice must already be in elution
/// order; `zip` truncates to the shorter side when peaks are missing.
pub fn match_by_rank(
    standards: &[ReferenceStandard],
    peaks: &[DetectedPeak],
    top_k: usize,
) -> Vec<MatchedPair> {
    let ranked = peaks
        .iter()
        .sorted_by_key(|p| Reverse(OrderedFloat(p.area)))
        .take(top_k)
        .sorted_by_key(|p| OrderedFloat(p.apex_time));
    standards
        .iter()
        .zip(ranked)
        .map(|(standard, peak)| MatchedPair {
            standard: standard.clone(),
            peak: peak.clone(),
        })
        .collect()
}

/// Chooses the matching strategy for a reference run and produces the pairs.
pub fn match_standards(
    standards: &[ReferenceStandard],
    peaks: &[DetectedPeak],
    tolerance: f64,
) -> (MatchStrategy, Vec<MatchedPair>) {
    let nearest = match_nearest_time(standards, peaks, tolerance);
    if nearest.len() >= MIN_NEAREST_MATCHES {
        (MatchStrategy::NearestTime { tolerance }, nearest)
    } else {
        let top_k = standards.len();
        (
            MatchStrategy::RankByArea { top_k },
            match_by_rank(standards, peaks, top_k),
        )
    }
}

/// Boundary standards located in an isoelectric-focusing run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryMatch {
    /// All boundary pairs in elution order, pI assigned positionally.
    pub pairs: Vec<MatchedPair>,
    /// How many of the pairs came from the leading region.
    pub front_count: usize,
}

/// Locates the boundary standards that bracket the sample window: the first
/// two peaks after the start cutoff, and the last two after the end cutoff.
///
/// The trailing search runs on the time-reversed tail so the same detector
/// walks it against elution order; its peaks are flipped back afterwards.
/// `CIEF_BOUNDARY_PI` is assigned to the combined list in elution order, so a
/// partially found set still gets the leading pI values.
pub fn match_boundary_standards(
    chromatogram: &Chromatogram,
    detection: &AnalysisConfiguration,
    config: &OrdinalBoundaryConfig,
) -> Result<BoundaryMatch, AnalysisError> {
    let boundary_config = AnalysisConfiguration {
        prominence_threshold: config.boundary_prominence,
        valley_search_window: config.boundary_valley_window,
        region_start: None,
        region_end: None,
        ..detection.clone()
    };

    let front_region = chromatogram.slice_between(config.boundary_start_cutoff, f64::INFINITY);
    let front: Vec<DetectedPeak> = detect_in_region(&front_region, &boundary_config)?
        .into_iter()
        .take(BOUNDARY_PEAKS_PER_SIDE)
        .collect();

    let tail_region = chromatogram.slice_between(config.boundary_end_cutoff, f64::INFINITY);
    let back: Vec<DetectedPeak> = if tail_region.len() >= MIN_TRACE_LEN {
        let t_min = tail_region.time[0];
        let t_max = tail_region.time[tail_region.len() - 1];
        let reversed = tail_region.reversed_time();
        // first peaks in reversed elution order are the last of the run
        let mut back: Vec<DetectedPeak> = detect_in_region(&reversed, &boundary_config)?
            .into_iter()
            .take(BOUNDARY_PEAKS_PER_SIDE)
            .map(|p| p.unreverse(t_min, t_max))
            .collect();
        back.sort_by_key(|p| OrderedFloat(p.apex_time));
        back
    } else {
        Vec::new()
    };

    let front_count = front.len();
    if front_count + back.len() == 0 {
        return Err(AnalysisError::NoPeaksDetected);
    }
    let pairs = front
        .into_iter()
        .chain(back)
        .zip(CIEF_BOUNDARY_PI)
        .map(|(peak, pi)| MatchedPair {
            standard: ReferenceStandard::new(format!("pI {:.1}", pi), pi, None),
            peak,
        })
        .collect();
    Ok(BoundaryMatch { pairs, front_count })
}

/// Detection helper for boundary regions: a region too short to analyse means
/// no standards there, not a failed run.
fn detect_in_region(
    region: &Chromatogram,
    config: &AnalysisConfiguration,
) -> Result<Vec<DetectedPeak>, AnalysisError> {
    match detect_peaks(region, config) {
        Ok(peaks) => Ok(peaks),
        Err(AnalysisError::InsufficientData { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Ordinary least squares of the transformed property value against
/// retention time.
///
/// # Arguments
///
/// * `pairs` - matched (standard, peak) pairs, at least 2.
/// * `transform` - `Log` for masses, `Linear` for pI.
///
/// # Returns
///
/// * `Result<CalibrationModel, AnalysisError>` - the fitted line with R².
pub fn fit_calibration(
    pairs: Vec<MatchedPair>,
    transform: DomainTransform,
) -> Result<CalibrationModel, AnalysisError> {
    if pairs.len() < 2 {
        return Err(AnalysisError::CalibrationUnavailable {
            matched: pairs.len(),
        });
    }
    let times: Vec<f64> = pairs.iter().map(|p| p.peak.apex_time).collect();
    let values: Vec<f64> = pairs
        .iter()
        .map(|p| transform.forward(p.standard.value))
        .collect();
    let t_mean = times.iter().mean();
    let v_mean = values.iter().mean();
    let ss_tt: f64 = times.iter().map(|t| (t - t_mean).powi(2)).sum();
    let ss_tv: f64 = times
        .iter()
        .zip(values.iter())
        .map(|(t, v)| (t - t_mean) * (v - v_mean))
        .sum();
    // all standards piled on one retention time, no line to fit
    if ss_tt <= 0.0 {
        return Err(AnalysisError::CalibrationUnavailable {
            matched: pairs.len(),
        });
    }
    let slope = ss_tv / ss_tt;
    let intercept = v_mean - slope * t_mean;
    let ss_vv: f64 = values.iter().map(|v| (v - v_mean).powi(2)).sum();
    let r_squared = if ss_vv > 0.0 {
        (ss_tv * ss_tv) / (ss_tt * ss_vv)
    } else {
        1.0
    };
    Ok(CalibrationModel {
        slope,
        intercept,
        transform,
        r_squared,
        pairs,
    })
}

/// Builds a mass calibration from a reference run: detect, match, fit in log
/// space.
pub fn build_mass_calibration(
    reference: &Chromatogram,
    standards: &[ReferenceStandard],
    detection: &AnalysisConfiguration,
) -> Result<CalibrationModel, AnalysisError> {
    let peaks = detect_peaks(reference, detection)?;
    if peaks.is_empty() {
        return Err(AnalysisError::NoPeaksDetected);
    }
    let (strategy, pairs) = match_standards(standards, &peaks, DEFAULT_MATCH_TOLERANCE);
    log::debug!(
        "matched {} of {} standards via {:?}",
        pairs.len(),
        standards.len(),
        strategy
    );
    fit_calibration(pairs, DomainTransform::Log)
}

/// Builds a pI calibration from the boundary standards of an
/// isoelectric-focusing run.
pub fn build_boundary_calibration(
    chromatogram: &Chromatogram,
    detection: &AnalysisConfiguration,
    config: &OrdinalBoundaryConfig,
) -> Result<(BoundaryMatch, CalibrationModel), AnalysisError> {
    let boundaries = match_boundary_standards(chromatogram, detection, config)?;
    let model = fit_calibration(boundaries.pairs.clone(), DomainTransform::Linear)?;
    Ok((boundaries, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(apex_time: f64, height: f64, area: f64) -> DetectedPeak {
        DetectedPeak {
            apex_time,
            height,
            area,
            left_valley: (apex_time - 0.4, 0.0),
            right_valley: (apex_time + 0.4, 0.0),
            weighted_time: apex_time,
        }
    }

    fn gaussian(t: f64, center: f64, sigma: f64, amplitude: f64) -> f64 {
        amplitude * (-0.5 * ((t - center) / sigma).powi(2)).exp()
    }

    fn synthetic_trace(peaks: &[(f64, f64, f64)], end: f64) -> Chromatogram {
        let samples = (end / 0.01) as usize + 1;
        let time: Vec<f64> = (0..samples).map(|i| i as f64 * 0.01).collect();
        let intensity: Vec<f64> = time
            .iter()
            .map(|&t| {
                peaks
                    .iter()
                    .map(|&(center, sigma, amplitude)| gaussian(t, center, sigma, amplitude))
                    .sum()
            })
            .collect();
        Chromatogram::new(time, intensity)
    }

    /// Standards collinear in log-mass space: ln(mass) = 20 - t, so every
    /// estimate is exact up to apex quantization.
    fn collinear_standards() -> Vec<ReferenceStandard> {
        [
            ("Thyroglobulin", 660_000.0),
            ("IgG", 150_000.0),
            ("BSA", 66_400.0),
            ("Myoglobin", 17_000.0),
            ("Uracil", 112.0),
        ]
        .iter()
        .map(|&(label, mass)| {
            let time = 20.0 - (mass as f64).ln();
            ReferenceStandard::new(label, mass, Some(time))
        })
        .collect()
    }

    #[test]
    fn test_nearest_time_matching_claims_peaks_once() {
        let standards = vec![
            ReferenceStandard::new("a", 10.0, Some(5.0)),
            ReferenceStandard::new("b", 20.0, Some(5.4)),
        ];
        let peaks = vec![peak(5.2, 100.0, 50.0), peak(6.0, 80.0, 40.0)];
        let pairs = match_nearest_time(&standards, &peaks, 0.75);
        assert_eq!(pairs.len(), 2);
        // "a" claims the 5.2 peak, so "b" has to settle for 6.0
        assert!((pairs[0].peak.apex_time - 5.2).abs() < 1e-12);
        assert!((pairs[1].peak.apex_time - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_time_respects_tolerance() {
        let standards = vec![ReferenceStandard::new("a", 10.0, Some(5.0))];
        let peaks = vec![peak(6.5, 100.0, 50.0)];
        assert!(match_nearest_time(&standards, &peaks, 0.75).is_empty());
    }

    #[test]
    fn test_rank_matching_assigns_by_elution() {
        let standards = vec![
            ReferenceStandard::new("first", 1.0, None),
            ReferenceStandard::new("second", 2.0, None),
            ReferenceStandard::new("third", 3.0, None),
        ];
        // four peaks; the smallest-area one at 6.0 must not be ranked
        let peaks = vec![
            peak(8.0, 50.0, 500.0),
            peak(4.0, 90.0, 300.0),
            peak(6.0, 10.0, 5.0),
            peak(10.0, 40.0, 400.0),
        ];
        let pairs = match_by_rank(&standards, &peaks, 3);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].standard.label, "first");
        assert!((pairs[0].peak.apex_time - 4.0).abs() < 1e-12);
        assert!((pairs[1].peak.apex_time - 8.0).abs() < 1e-12);
        assert!((pairs[2].peak.apex_time - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_strategy_falls_back_below_three_matches() {
        let standards = vec![
            ReferenceStandard::new("a", 10.0, Some(2.0)),
            ReferenceStandard::new("b", 20.0, Some(4.0)),
            ReferenceStandard::new("c", 30.0, Some(6.0)),
        ];
        // only one peak lands near an expected time
        let peaks = vec![peak(4.1, 100.0, 500.0), peak(9.0, 80.0, 400.0)];
        let (strategy, pairs) = match_standards(&standards, &peaks, 0.75);
        assert!(matches!(strategy, MatchStrategy::RankByArea { top_k: 3 }));
        assert_eq!(pairs.len(), 2);

        let peaks = vec![
            peak(2.1, 100.0, 500.0),
            peak(4.0, 90.0, 400.0),
            peak(5.9, 80.0, 300.0),
        ];
        let (strategy, pairs) = match_standards(&standards, &peaks, 0.75);
        assert!(matches!(strategy, MatchStrategy::NearestTime { .. }));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_fit_requires_two_pairs() {
        let standard = ReferenceStandard::new("only", 10.0, None);
        let pairs = vec![MatchedPair {
            standard,
            peak: peak(5.0, 100.0, 50.0),
        }];
        assert!(matches!(
            fit_calibration(pairs, DomainTransform::Linear),
            Err(AnalysisError::CalibrationUnavailable { matched: 1 })
        ));
    }

    #[test]
    fn test_fit_exact_line() {
        // pI = -0.5 * t + 12
        let pairs: Vec<MatchedPair> = [(4.0, 10.0), (8.0, 8.0), (12.0, 6.0)]
            .iter()
            .map(|&(t, pi)| MatchedPair {
                standard: ReferenceStandard::new("s", pi, None),
                peak: peak(t, 100.0, 50.0),
            })
            .collect();
        let model = fit_calibration(pairs, DomainTransform::Linear).unwrap();
        assert!((model.slope + 0.5).abs() < 1e-12);
        assert!((model.intercept - 12.0).abs() < 1e-12);
        assert!((model.r_squared - 1.0).abs() < 1e-12);
        assert!((model.estimate(6.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_mass_calibration_scenario() {
        // reference run with the five standards collinear in log space
        let standards = collinear_standards();
        let trace_peaks: Vec<(f64, f64, f64)> = standards
            .iter()
            .enumerate()
            .map(|(i, s)| (s.expected_time.unwrap(), 0.12, 500.0 - 80.0 * i as f64))
            .collect();
        let reference = synthetic_trace(&trace_peaks, 18.0);
        let config = AnalysisConfiguration::default();

        let model = build_mass_calibration(&reference, &standards, &config).unwrap();
        assert!(model.r_squared > 0.999);

        // IgG mass recovered within 5% at its elution time
        let igg_time = 20.0 - 150_000.0f64.ln();
        let estimate = model.estimate(igg_time);
        assert!((estimate - 150_000.0).abs() / 150_000.0 < 0.05);

        // round trip: every matched standard recovered within 1%
        for pair in &model.pairs {
            let estimate = model.estimate(pair.peak.apex_time);
            let truth = pair.standard.value;
            assert!((estimate - truth).abs() / truth < 0.01);
        }
    }

    #[test]
    fn test_boundary_standards_located_and_ordered() {
        // two tall markers up front, two at the back, samples in between
        let trace = synthetic_trace(
            &[
                (13.0, 0.15, 9000.0),
                (15.0, 0.15, 9000.0),
                (20.0, 0.2, 3000.0),
                (24.0, 0.2, 4000.0),
                (31.0, 0.15, 8000.0),
                (33.0, 0.15, 8000.0),
            ],
            36.0,
        );
        let detection = AnalysisConfiguration::default();
        let config = OrdinalBoundaryConfig::default();
        let boundaries = match_boundary_standards(&trace, &detection, &config).unwrap();
        assert_eq!(boundaries.front_count, 2);
        assert_eq!(boundaries.pairs.len(), 4);
        let times: Vec<f64> = boundaries.pairs.iter().map(|p| p.peak.apex_time).collect();
        for (found, expected) in times.iter().zip([13.0, 15.0, 31.0, 33.0]) {
            assert!((found - expected).abs() < 0.05);
        }
        let pi: Vec<f64> = boundaries.pairs.iter().map(|p| p.standard.value).collect();
        assert_eq!(pi, vec![10.0, 9.5, 5.5, 4.0]);
    }

    #[test]
    fn test_boundary_matching_without_back_standards() {
        let trace = synthetic_trace(
            &[(13.0, 0.15, 9000.0), (15.0, 0.15, 9000.0), (20.0, 0.2, 3000.0)],
            28.0,
        );
        let detection = AnalysisConfiguration::default();
        let config = OrdinalBoundaryConfig::default();
        let boundaries = match_boundary_standards(&trace, &detection, &config).unwrap();
        assert_eq!(boundaries.front_count, 2);
        assert_eq!(boundaries.pairs.len(), 2);
        assert_eq!(
            boundaries
                .pairs
                .iter()
                .map(|p| p.standard.value)
                .collect::<Vec<f64>>(),
            vec![10.0, 9.5]
        );
    }

    #[test]
    fn test_boundary_matching_fails_on_empty_run() {
        let trace = synthetic_trace(&[(5.0, 0.2, 500.0)], 36.0);
        let detection = AnalysisConfiguration::default();
        let config = OrdinalBoundaryConfig::default();
        assert!(matches!(
            match_boundary_standards(&trace, &detection, &config),
            Err(AnalysisError::NoPeaksDetected)
        ));
    }
}
