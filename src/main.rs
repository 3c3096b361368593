use chromcore::algorithm::detection::detect_peaks;
use chromcore::data::chromatogram::Chromatogram;
use chromcore::data::config::AnalysisConfiguration;

fn gaussian(t: f64, center: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-0.5 * ((t - center) / sigma).powi(2)).exp()
}

fn main() {
    // two peaks on a flat baseline, sampled at 0.01 min
    let time: Vec<f64> = (0..1400).map(|i| i as f64 * 0.01).collect();
    let intensity: Vec<f64> = time
        .iter()
        .map(|&t| gaussian(t, 7.84, 0.15, 900.0) + gaussian(t, 10.0, 0.2, 120.0))
        .collect();
    let chromatogram = Chromatogram::new(time, intensity);

    match detect_peaks(&chromatogram, &AnalysisConfiguration::default()) {
        Ok(peaks) => {
            for peak in peaks {
                println!(
                    "peak at {:.2} min, height {:.1}, area {:.1}",
                    peak.apex_time, peak.height, peak.area
                );
            }
        }
        Err(e) => eprintln!("detection failed: {}", e),
    }
}
