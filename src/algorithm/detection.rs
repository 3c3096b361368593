use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::algorithm::smoothing::smooth_signal;
use crate::data::chromatogram::Chromatogram;
use crate::data::config::AnalysisConfiguration;
use crate::data::peak::DetectedPeak;
use crate::error::AnalysisError;

/// Minimum number of samples a trace needs before detection is attempted.
pub const MIN_TRACE_LEN: usize = 3;

/// Indices of strict local maxima. Plateaus report their midpoint; NaN
/// samples never qualify, so flat or all-NaN traces yield no candidates.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut maxima = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i - 1] < signal[i] {
            let mut j = i;
            while j + 1 < n && signal[j + 1] == signal[i] {
                j += 1;
            }
            if j + 1 < n && signal[j + 1] < signal[i] {
                maxima.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    maxima
}

/// Topographic prominence of each maximum: walk out on both sides until the
/// signal exceeds the apex or the trace ends, and measure the apex against
/// the higher of the two interval minima.
fn prominences(signal: &[f64], maxima: &[usize]) -> Vec<f64> {
    maxima
        .iter()
        .map(|&apex| {
            let height = signal[apex];
            let mut left_min = height;
            let mut i = apex;
            while i > 0 {
                i -= 1;
                if signal[i] > height {
                    break;
                }
                left_min = left_min.min(signal[i]);
            }
            let mut right_min = height;
            let mut i = apex;
            while i + 1 < signal.len() {
                i += 1;
                if signal[i] > height {
                    break;
                }
                right_min = right_min.min(signal[i]);
            }
            height - left_min.max(right_min)
        })
        .collect()
}

/// Enforces a minimum index distance between maxima, giving taller maxima
/// priority over their lower neighbours.
fn enforce_min_distance(maxima: &[usize], signal: &[f64], min_distance: usize) -> Vec<usize> {
    if min_distance <= 1 || maxima.len() < 2 {
        return maxima.to_vec();
    }
    let mut order: Vec<usize> = (0..maxima.len()).collect();
    order.sort_by_key(|&k| Reverse(OrderedFloat(signal[maxima[k]])));
    let mut kept: Vec<usize> = Vec::new();
    for k in order {
        if kept
            .iter()
            .all(|&j| maxima[k].abs_diff(maxima[j]) >= min_distance)
        {
            kept.push(k);
        }
    }
    let mut result: Vec<usize> = kept.into_iter().map(|k| maxima[k]).collect();
    result.sort_unstable();
    result
}

/// Local maxima filtered by prominence and minimum separation, ascending by
/// index.
pub fn find_peaks(signal: &[f64], prominence: f64, min_distance: usize) -> Vec<usize> {
    let candidates = local_maxima(signal);
    let proms = prominences(signal, &candidates);
    let prominent: Vec<usize> = candidates
        .into_iter()
        .zip(proms)
        .filter_map(|(apex, prom)| (prom >= prominence).then_some(apex))
        .collect();
    enforce_min_distance(&prominent, signal, min_distance)
}

struct ValleyBounds {
    left: usize,
    right: usize,
}

fn argmin(signal: &[f64], range: std::ops::RangeInclusive<usize>) -> usize {
    let start = *range.start();
    signal[range.clone()]
        .iter()
        .enumerate()
        .min_by_key(|(_, &y)| OrderedFloat(y))
        .map(|(offset, _)| start + offset)
        .unwrap_or(start)
}

/// Finds the lowest smoothed value on each side of the apex within the
/// search window. `None` rejects the candidate: either search slice is empty,
/// or a valley fails the drop check and the apex is an unresolved shoulder.
fn resolve_valleys(
    smoothed: &[f64],
    apex: usize,
    window_points: usize,
    drop_ratio: f64,
) -> Option<ValleyBounds> {
    let height = smoothed[apex];
    let max_valley_height = height * (1.0 - drop_ratio);

    let left_limit = apex.saturating_sub(window_points);
    if left_limit == apex {
        return None;
    }
    let left = argmin(smoothed, left_limit..=apex - 1);

    let right_limit = (apex + window_points).min(smoothed.len() - 1);
    let right = argmin(smoothed, apex..=right_limit);

    if smoothed[left] > max_valley_height || smoothed[right] > max_valley_height {
        return None;
    }
    Some(ValleyBounds { left, right })
}

/// Integrates the smoothed signal above a straight baseline drawn between the
/// valley points and computes the area-weighted retention time of the span.
///
/// The baseline is interpolated linearly over the sample count; the area is a
/// trapezoidal sum of the corrected signal against time.
fn integrate(time: &[f64], smoothed: &[f64], bounds: &ValleyBounds) -> (f64, f64) {
    let left = bounds.left;
    let right = bounds.right;
    let count = right - left + 1;
    let left_height = smoothed[left];
    let right_height = smoothed[right];

    let baseline_at = |i: usize| {
        if count < 2 {
            left_height
        } else {
            let fraction = i as f64 / (count - 1) as f64;
            left_height + (right_height - left_height) * fraction
        }
    };

    let mut area = 0.0;
    let mut weighted_sum = 0.0;
    let mut corrected_sum = 0.0;
    let mut previous = smoothed[left] - baseline_at(0);
    weighted_sum += time[left] * previous;
    corrected_sum += previous;
    for i in 1..count {
        let corrected = smoothed[left + i] - baseline_at(i);
        let dt = time[left + i] - time[left + i - 1];
        area += 0.5 * (corrected + previous) * dt;
        weighted_sum += time[left + i] * corrected;
        corrected_sum += corrected;
        previous = corrected;
    }

    let weighted_time = if corrected_sum > 0.0 {
        weighted_sum / corrected_sum
    } else {
        0.5 * (time[left] + time[right])
    };
    (area, weighted_time)
}

/// Runs preprocessing, candidate detection, valley resolution and integration
/// over one chromatogram.
///
/// Candidates that fail the valley drop or positive-area checks are dropped
/// and logged at debug level; an empty result is valid and it is the caller's
/// decision whether that is an error. Output is ascending by apex time.
///
/// # Arguments
///
/// * `chromatogram` - the trace, at least `MIN_TRACE_LEN` samples after the
///   configured region cutoffs are applied.
/// * `config` - detection parameters, validated before use.
///
/// # Returns
///
/// * `Result<Vec<DetectedPeak>, AnalysisError>` - the accepted peaks.
pub fn detect_peaks(
    chromatogram: &Chromatogram,
    config: &AnalysisConfiguration,
) -> Result<Vec<DetectedPeak>, AnalysisError> {
    config.validate()?;

    let region = if config.region_start.is_some() || config.region_end.is_some() {
        chromatogram.slice_between(
            config.region_start.unwrap_or(f64::NEG_INFINITY),
            config.region_end.unwrap_or(f64::INFINITY),
        )
    } else {
        chromatogram.clone()
    };
    if region.len() < MIN_TRACE_LEN {
        return Err(AnalysisError::InsufficientData {
            found: region.len(),
            required: MIN_TRACE_LEN,
        });
    }
    // degenerate time axis, nothing to locate peaks on
    let Some(interval) = region.mean_interval() else {
        return Ok(Vec::new());
    };

    let time = region.time.as_slice();
    let smoothed = smooth_signal(region.intensity.as_slice(), config);

    let min_distance = ((config.min_peak_separation / interval).floor() as usize).max(1);
    let window_points = (config.valley_search_window / interval) as usize;

    let mut candidates = find_peaks(&smoothed, config.prominence_threshold, min_distance);
    if candidates.len() > config.max_peaks {
        candidates.sort_by_key(|&i| Reverse(OrderedFloat(smoothed[i])));
        candidates.truncate(config.max_peaks);
        candidates.sort_unstable();
    }

    let mut peaks = Vec::with_capacity(candidates.len());
    for apex in candidates {
        let Some(bounds) =
            resolve_valleys(&smoothed, apex, window_points, config.valley_drop_ratio)
        else {
            log::debug!(
                "candidate at {:.3} min rejected: valleys above the drop threshold",
                time[apex]
            );
            continue;
        };
        let (area, weighted_time) = integrate(time, &smoothed, &bounds);
        if area <= 0.0 {
            log::debug!(
                "candidate at {:.3} min rejected: non-positive area {:.3}",
                time[apex],
                area
            );
            continue;
        }
        peaks.push(DetectedPeak {
            apex_time: time[apex],
            height: smoothed[apex],
            area,
            left_valley: (time[bounds.left], smoothed[bounds.left]),
            right_valley: (time[bounds.right], smoothed[bounds.right]),
            weighted_time,
        });
    }
    Ok(peaks)
}
