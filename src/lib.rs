// data module
pub mod data {
    pub mod chromatogram;
    pub mod config;
    pub mod peak;
    pub mod calibration;
    pub mod classification;
}

// algorithm module
pub mod algorithm {
    pub mod smoothing;
    pub mod detection;
    pub mod calibration;
    pub mod classification;
    pub mod pipeline;
}

pub mod error;
pub mod utility;
