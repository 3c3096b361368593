use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::algorithm::calibration::BoundaryMatch;
use crate::data::calibration::CalibrationModel;
use crate::data::classification::{Percent, Species, SpeciesBin, SpeciesClassification};
use crate::data::config::{ApexMode, MassExclusionConfig, OrdinalBoundaryConfig};
use crate::data::peak::DetectedPeak;
use crate::error::AnalysisError;

/// Mass-exclusion classification for size-exclusion runs.
///
/// The peak nearest the configured main-peak time anchors the Main Peak bin.
/// Earlier peaks pool into HMW; later peaks with an apex at or before the
/// low-MW cutoff pool into LMW; anything past the cutoff is excluded from the
/// total. Returns the unavailable (empty) classification when no peaks were
/// resolved.
///
/// # Arguments
///
/// * `peaks` - detected peaks in elution order.
/// * `config` - main-peak time, low-MW cutoff and quantitation floor.
/// * `calibration` - optional mass calibration for per-bin estimates.
///
/// # Returns
///
/// * `SpeciesClassification` - bins in elution order (HMW, Main Peak, LMW),
///   empty bins omitted.
pub fn classify_mass_exclusion(
    peaks: &[DetectedPeak],
    config: &MassExclusionConfig,
    calibration: Option<&CalibrationModel>,
) -> SpeciesClassification {
    let Some((main_index, _)) = peaks
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| OrderedFloat((p.apex_time - config.main_peak_time).abs()))
    else {
        return SpeciesClassification::unavailable();
    };
    let main = &peaks[main_index];

    let member_of = |index: usize, peak: &DetectedPeak| -> Option<Species> {
        if index == main_index {
            Some(Species::MainPeak)
        } else if peak.apex_time < config.main_peak_time {
            Some(Species::Hmw)
        } else if peak.apex_time <= config.low_mw_cutoff {
            Some(Species::Lmw)
        } else {
            None
        }
    };

    let mut hmw: Vec<&DetectedPeak> = Vec::new();
    let mut lmw: Vec<&DetectedPeak> = Vec::new();
    for (i, peak) in peaks.iter().enumerate() {
        match member_of(i, peak) {
            Some(Species::Hmw) => hmw.push(peak),
            Some(Species::Lmw) => lmw.push(peak),
            _ => {}
        }
    }

    let hmw_area: f64 = hmw.iter().map(|p| p.area).sum();
    let lmw_area: f64 = lmw.iter().map(|p| p.area).sum();
    let total = main.area + hmw_area + lmw_area;
    if total <= 0.0 {
        return SpeciesClassification::unavailable();
    }

    let percent_of = |area: f64| -> Percent {
        let percent = area / total * 100.0;
        match config.detection_floor_area {
            Some(floor) if percent >= 100.0 => Percent::GreaterThan(100.0 - floor / total * 100.0),
            _ => Percent::Exact(percent),
        }
    };
    let estimate_at = |time: f64| calibration.map(|model| model.estimate(time));

    let mut bins = Vec::with_capacity(3);
    if !hmw.is_empty() {
        let start = hmw
            .iter()
            .map(|p| OrderedFloat(p.start_time()))
            .min()
            .map(|t| t.0)
            .unwrap_or(main.start_time());
        let tallest = tallest_of(&hmw);
        bins.push(SpeciesBin {
            species: Species::Hmw,
            area: hmw_area,
            percent: percent_of(hmw_area),
            start_time: start,
            end_time: main.start_time(),
            estimated_property: estimate_at(tallest.apex_time),
        });
    }
    bins.push(SpeciesBin {
        species: Species::MainPeak,
        area: main.area,
        percent: percent_of(main.area),
        start_time: main.start_time(),
        end_time: main.end_time(),
        estimated_property: estimate_at(main.apex_time),
    });
    if !lmw.is_empty() {
        let end = lmw
            .iter()
            .map(|p| OrderedFloat(p.end_time()))
            .max()
            .map(|t| t.0)
            .unwrap_or(main.end_time());
        let tallest = tallest_of(&lmw);
        bins.push(SpeciesBin {
            species: Species::Lmw,
            area: lmw_area,
            percent: percent_of(lmw_area),
            start_time: main.end_time(),
            // the reported LMW window never extends past the cutoff
            end_time: end.min(config.low_mw_cutoff),
            estimated_property: estimate_at(tallest.apex_time),
        });
    }

    let classification = SpeciesClassification {
        bins,
        total_area: total,
    };
    let percent_sum = classification.percent_total();
    if (percent_sum - 100.0).abs() > 0.01 {
        log::debug!("species percentages sum to {:.3}", percent_sum);
    }
    classification
}

/// Derives the sample elution window from the detected boundary standards.
///
/// The window opens after the second front standard (or the first detected
/// boundary when the front is incomplete) and closes before the first back
/// standard, or at the end of the run when no back standards were found.
pub fn sample_window(
    boundaries: &BoundaryMatch,
    run_end: f64,
    config: &OrdinalBoundaryConfig,
) -> Result<(f64, f64), AnalysisError> {
    let pairs = &boundaries.pairs;
    if pairs.is_empty() {
        return Err(AnalysisError::RegionResolution(
            "no boundary standards detected".to_string(),
        ));
    }
    let front = boundaries.front_count.min(pairs.len());
    let lead = if front >= 2 { &pairs[1] } else { &pairs[0] };
    let start = lead.peak.end_time() + config.window_lead_pad;
    let end = if front < pairs.len() {
        pairs[front].peak.start_time() - config.window_tail_pad
    } else {
        run_end
    };
    if end <= start {
        return Err(AnalysisError::RegionResolution(format!(
            "derived window {:.2}-{:.2} min is empty",
            start, end
        )));
    }
    Ok((start, end))
}

/// Ordinal-boundary classification for isoelectric-focusing runs.
///
/// Expects peaks detected inside the sample window. The two tallest become
/// Light Chain (earlier) and Heavy Chain (later); peaks before the Light
/// Chain pool into LMW, peaks after the Heavy Chain into HMW. Peaks between
/// the chains match no ordinal slot and are left out of the total.
pub fn classify_ordinal_boundary(
    peaks: &[DetectedPeak],
    config: &OrdinalBoundaryConfig,
    calibration: Option<&CalibrationModel>,
) -> SpeciesClassification {
    if peaks.is_empty() {
        return SpeciesClassification::unavailable();
    }
    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by_key(|&i| Reverse(OrderedFloat(peaks[i].height)));
    let (light_index, heavy_index) = if by_height.len() >= 2 {
        let (a, b) = (by_height[0], by_height[1]);
        if peaks[a].apex_time < peaks[b].apex_time {
            (a, Some(b))
        } else {
            (b, Some(a))
        }
    } else {
        (by_height[0], None)
    };
    let light_time = peaks[light_index].apex_time;
    let heavy_time = heavy_index.map(|i| peaks[i].apex_time);

    let member_of = |index: usize, peak: &DetectedPeak| -> Option<Species> {
        if index == light_index {
            Some(Species::LightChain)
        } else if Some(index) == heavy_index {
            Some(Species::HeavyChain)
        } else if peak.apex_time < light_time {
            Some(Species::Lmw)
        } else if heavy_time.is_some_and(|t| peak.apex_time > t) {
            Some(Species::Hmw)
        } else {
            None
        }
    };

    let eval_time = |peak: &DetectedPeak| match config.apex_mode {
        ApexMode::ApexTime => peak.apex_time,
        ApexMode::WeightedTime => peak.weighted_time,
    };
    let estimate = |peak: &DetectedPeak| calibration.map(|model| model.estimate(eval_time(peak)));

    let mut lmw: Vec<&DetectedPeak> = Vec::new();
    let mut hmw: Vec<&DetectedPeak> = Vec::new();
    for (i, peak) in peaks.iter().enumerate() {
        match member_of(i, peak) {
            Some(Species::Lmw) => lmw.push(peak),
            Some(Species::Hmw) => hmw.push(peak),
            _ => {}
        }
    }
    let lmw_area: f64 = lmw.iter().map(|p| p.area).sum();
    let hmw_area: f64 = hmw.iter().map(|p| p.area).sum();
    let mut total = peaks[light_index].area + lmw_area + hmw_area;
    if let Some(i) = heavy_index {
        total += peaks[i].area;
    }
    if total <= 0.0 {
        return SpeciesClassification::unavailable();
    }

    let mut bins = Vec::with_capacity(4);
    if !lmw.is_empty() {
        let tallest = tallest_of(&lmw);
        bins.push(SpeciesBin {
            species: Species::Lmw,
            area: lmw_area,
            percent: Percent::Exact(lmw_area / total * 100.0),
            start_time: span_start(&lmw),
            end_time: peaks[light_index].start_time(),
            estimated_property: estimate(tallest),
        });
    }
    let light = &peaks[light_index];
    bins.push(SpeciesBin {
        species: Species::LightChain,
        area: light.area,
        percent: Percent::Exact(light.area / total * 100.0),
        start_time: light.start_time(),
        end_time: light.end_time(),
        estimated_property: estimate(light),
    });
    if let Some(i) = heavy_index {
        let heavy = &peaks[i];
        bins.push(SpeciesBin {
            species: Species::HeavyChain,
            area: heavy.area,
            percent: Percent::Exact(heavy.area / total * 100.0),
            start_time: heavy.start_time(),
            end_time: heavy.end_time(),
            estimated_property: estimate(heavy),
        });
    }
    if !hmw.is_empty() {
        let tallest = tallest_of(&hmw);
        let anchor = heavy_index.unwrap_or(light_index);
        bins.push(SpeciesBin {
            species: Species::Hmw,
            area: hmw_area,
            percent: Percent::Exact(hmw_area / total * 100.0),
            start_time: peaks[anchor].end_time(),
            end_time: span_end(&hmw),
            estimated_property: estimate(tallest),
        });
    }

    SpeciesClassification {
        bins,
        total_area: total,
    }
}

fn tallest_of<'a>(members: &[&'a DetectedPeak]) -> &'a DetectedPeak {
    members
        .iter()
        .copied()
        .max_by_key(|p| OrderedFloat(p.height))
        .unwrap_or(members[0])
}

fn span_start(members: &[&DetectedPeak]) -> f64 {
    members
        .iter()
        .map(|p| OrderedFloat(p.start_time()))
        .min()
        .map(|t| t.0)
        .unwrap_or(0.0)
}

fn span_end(members: &[&DetectedPeak]) -> f64 {
    members
        .iter()
        .map(|p| OrderedFloat(p.end_time()))
        .max()
        .map(|t| t.0)
        .unwrap_or(0.0)
}
