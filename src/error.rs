use thiserror::Error;

/// Errors produced by the analysis pipeline.
///
/// Per-peak rejections (failed valley or area checks) are handled locally by
/// dropping the candidate and never surface here. The pipeline is
/// deterministic for a given input and configuration, so none of these are
/// worth retrying without a parameter change.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Chromatogram empty or below the minimum usable length.
    #[error("chromatogram has {found} samples, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    /// A reference run produced no peaks to match standards against.
    #[error("no peaks detected")]
    NoPeaksDetected,

    /// Too few standards could be paired with detected peaks to fit a line.
    #[error("calibration unavailable: {matched} matched standards, at least 2 required")]
    CalibrationUnavailable { matched: usize },

    /// The sample elution window could not be derived from boundary standards.
    #[error("sample region could not be resolved: {0}")]
    RegionResolution(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
