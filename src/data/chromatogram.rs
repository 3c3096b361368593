use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Represents a single-channel chromatographic trace.
///
/// Time (minutes) and intensity share one index; both are stored behind `Arc`
/// so clones are O(1) and the trace is immutable once constructed. Samples are
/// sorted by time during construction, so downstream index arithmetic can
/// assume elution order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chromatogram {
    pub time: Arc<Vec<f64>>,
    pub intensity: Arc<Vec<f64>>,
}

impl Chromatogram {
    /// Constructs a new `Chromatogram`, sorting samples by time if needed.
    ///
    /// # Arguments
    ///
    /// * `time` - retention times in minutes, one per sample.
    /// * `intensity` - detector response, same length as `time`.
    ///
    /// # Returns
    ///
    /// * `Chromatogram` - the trace in elution order.
    pub fn new(time: Vec<f64>, intensity: Vec<f64>) -> Self {
        debug_assert_eq!(time.len(), intensity.len());
        if time.windows(2).all(|w| w[0] <= w[1]) {
            return Chromatogram {
                time: Arc::new(time),
                intensity: Arc::new(intensity),
            };
        }
        let mut order: Vec<usize> = (0..time.len()).collect();
        order.sort_by_key(|&i| OrderedFloat(time[i]));
        let sorted_time = order.iter().map(|&i| time[i]).collect();
        let sorted_intensity = order.iter().map(|&i| intensity[i]).collect();
        Chromatogram {
            time: Arc::new(sorted_time),
            intensity: Arc::new(sorted_intensity),
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Mean sampling interval in minutes, `None` for traces under two samples
    /// or with a non-positive time span.
    pub fn mean_interval(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let span = self.time[self.len() - 1] - self.time[0];
        (span > 0.0).then(|| span / (self.len() - 1) as f64)
    }

    /// Returns the sub-trace with retention times in `[start, end]`, bounds
    /// inclusive. Either bound may be infinite for a one-sided cut.
    pub fn slice_between(&self, start: f64, end: f64) -> Chromatogram {
        let mut time = Vec::new();
        let mut intensity = Vec::new();
        for (&t, &y) in self.time.iter().zip(self.intensity.iter()) {
            if t >= start && t <= end {
                time.push(t);
                intensity.push(y);
            }
        }
        Chromatogram {
            time: Arc::new(time),
            intensity: Arc::new(intensity),
        }
    }

    /// Returns the trace with its time axis flipped, `t' = t_max - (t - t_min)`,
    /// re-sorted into elution order. Used to search trailing boundary
    /// standards against elution order.
    pub fn reversed_time(&self) -> Chromatogram {
        let n = self.len();
        if n == 0 {
            return self.clone();
        }
        let t_min = self.time[0];
        let t_max = self.time[n - 1];
        let time = self.time.iter().rev().map(|&t| t_max - (t - t_min)).collect();
        let intensity = self.intensity.iter().rev().copied().collect();
        Chromatogram {
            time: Arc::new(time),
            intensity: Arc::new(intensity),
        }
    }

    /// Trapezoidal integral of the raw intensity over the full time axis.
    pub fn total_area(&self) -> f64 {
        let mut area = 0.0;
        for i in 1..self.len() {
            let dt = self.time[i] - self.time[i - 1];
            area += 0.5 * (self.intensity[i] + self.intensity[i - 1]) * dt;
        }
        area
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensity.iter().fold(f64::NEG_INFINITY, |acc, &y| acc.max(y))
    }
}
