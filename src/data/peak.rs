use serde::{Deserialize, Serialize};

/// A detected, integrated chromatographic peak.
///
/// Produced only after the candidate has passed the valley drop and positive
/// area checks; every field here is final. Times are minutes, heights are
/// smoothed intensities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedPeak {
    /// Apex retention time.
    pub apex_time: f64,
    /// Smoothed intensity at the apex.
    pub height: f64,
    /// Baseline-corrected valley-to-valley area.
    pub area: f64,
    /// Left integration limit as (time, smoothed intensity).
    pub left_valley: (f64, f64),
    /// Right integration limit as (time, smoothed intensity).
    pub right_valley: (f64, f64),
    /// Area-weighted retention time over the integration span.
    pub weighted_time: f64,
}

impl DetectedPeak {
    pub fn start_time(&self) -> f64 {
        self.left_valley.0
    }

    pub fn end_time(&self) -> f64 {
        self.right_valley.0
    }

    /// Maps a peak detected on a time-reversed trace back onto the original
    /// axis. `t_min`/`t_max` are the bounds of the region that was reversed;
    /// the valleys swap sides when the axis flips.
    pub fn unreverse(&self, t_min: f64, t_max: f64) -> DetectedPeak {
        let flip = |t: f64| t_max - (t - t_min);
        DetectedPeak {
            apex_time: flip(self.apex_time),
            height: self.height,
            area: self.area,
            left_valley: (flip(self.right_valley.0), self.right_valley.1),
            right_valley: (flip(self.left_valley.0), self.left_valley.1),
            weighted_time: flip(self.weighted_time),
        }
    }
}
