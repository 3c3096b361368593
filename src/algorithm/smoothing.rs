use nalgebra::DMatrix;

use crate::data::config::AnalysisConfiguration;

/// Least-squares projection matrix for one Savitzky-Golay window.
///
/// Column `j` of the design matrix holds offset powers `(i - half)^j`; the
/// projection `A (AᵀA)⁻¹ Aᵀ` evaluates the window's polynomial fit at every
/// offset. Row `half` is the usual smoothing kernel, the remaining rows give
/// the boundary fits.
fn savgol_projection(window: usize, polyorder: usize) -> DMatrix<f64> {
    let half = (window / 2) as f64;
    let design = DMatrix::from_fn(window, polyorder + 1, |i, j| (i as f64 - half).powi(j as i32));
    let normal = design.transpose() * &design;
    match normal.try_inverse() {
        Some(inverse) => &design * inverse * design.transpose(),
        // the normal matrix is singular only for polyorder >= window, which
        // the callers clamp away; pass the signal through if it happens
        None => DMatrix::identity(window, window),
    }
}

/// Savitzky-Golay filter with polynomial-fit edge handling.
///
/// Interior samples use the sliding central kernel; the first and last
/// half-window samples are taken from the boundary windows' fitted
/// polynomials, so edges are neither truncated nor padded.
///
/// # Arguments
///
/// * `signal` - the raw intensities, at least `window` samples.
/// * `window` - odd window length, at least 3.
/// * `polyorder` - polynomial order, below `window`.
///
/// # Returns
///
/// * `Vec<f64>` - the smoothed signal, same length as the input.
pub fn savgol_filter(signal: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = signal.len();
    let half = window / 2;
    let projection = savgol_projection(window, polyorder);
    let mut smoothed = vec![0.0; n];

    for i in half..n - half {
        let mut acc = 0.0;
        for k in 0..window {
            acc += projection[(half, k)] * signal[i - half + k];
        }
        smoothed[i] = acc;
    }
    for i in 0..half {
        let mut acc = 0.0;
        for k in 0..window {
            acc += projection[(i, k)] * signal[k];
        }
        smoothed[i] = acc;

        let row = window - 1 - i;
        let mut acc = 0.0;
        for k in 0..window {
            acc += projection[(row, k)] * signal[n - window + k];
        }
        smoothed[n - 1 - i] = acc;
    }
    smoothed
}

/// Smooths a raw trace per the configuration, degrading instead of failing.
///
/// The window is clamped to the largest valid odd length the trace allows and
/// the polynomial order is clamped below it; traces under 3 samples are
/// returned unchanged.
pub fn smooth_signal(signal: &[f64], config: &AnalysisConfiguration) -> Vec<f64> {
    let n = signal.len();
    if n < 3 {
        return signal.to_vec();
    }
    let mut window = config.smoothing_window.min(n);
    if window % 2 == 0 {
        window -= 1;
    }
    if window < 3 {
        return signal.to_vec();
    }
    let polyorder = config.smoothing_polyorder.min(window - 1);
    savgol_filter(signal, window, polyorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(t: f64, center: f64, sigma: f64, amplitude: f64) -> f64 {
        amplitude * (-0.5 * ((t - center) / sigma).powi(2)).exp()
    }

    #[test]
    fn test_polynomial_signals_pass_through() {
        // a cubic is exactly representable at polyorder 3, edges included
        let signal: Vec<f64> = (0..50)
            .map(|i| {
                let x = i as f64 * 0.1;
                0.5 * x.powi(3) - 2.0 * x.powi(2) + 3.0 * x + 1.0
            })
            .collect();
        let smoothed = savgol_filter(&signal, 11, 3);
        for (raw, out) in signal.iter().zip(smoothed.iter()) {
            assert!((raw - out).abs() < 1e-8);
        }
    }

    #[test]
    fn test_noise_variance_reduced() {
        // deterministic high-frequency ripple on a constant level
        let signal: Vec<f64> = (0..200)
            .map(|i| 100.0 + if i % 2 == 0 { 5.0 } else { -5.0 })
            .collect();
        let smoothed = savgol_filter(&signal, 11, 3);
        let raw_dev: f64 = signal.iter().map(|y| (y - 100.0).powi(2)).sum();
        let smooth_dev: f64 = smoothed.iter().map(|y| (y - 100.0).powi(2)).sum();
        assert!(smooth_dev < raw_dev * 0.5);
    }

    #[test]
    fn test_apex_position_preserved() {
        let signal: Vec<f64> = (0..400)
            .map(|i| gaussian(i as f64 * 0.01, 2.0, 0.15, 900.0))
            .collect();
        let smoothed = savgol_filter(&signal, 11, 3);
        let apex = smoothed
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(apex, 200);
        assert!((smoothed[apex] - 900.0).abs() / 900.0 < 0.01);
    }

    #[test]
    fn test_window_clamped_for_short_traces() {
        let config = AnalysisConfiguration {
            smoothing_window: 11,
            ..Default::default()
        };
        // 6 samples: window clamps to 5, output stays finite and same length
        let signal = vec![0.0, 1.0, 4.0, 4.0, 1.0, 0.0];
        let smoothed = smooth_signal(&signal, &config);
        assert_eq!(smoothed.len(), 6);
        assert!(smoothed.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn test_tiny_traces_returned_unchanged() {
        let config = AnalysisConfiguration::default();
        assert_eq!(smooth_signal(&[1.0, 2.0], &config), vec![1.0, 2.0]);
        assert_eq!(smooth_signal(&[], &config), Vec::<f64>::new());
    }
}
