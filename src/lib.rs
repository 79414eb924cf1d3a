//! # Stamp Colors
//!
//! A Rust crate for measuring stamp colors from screen-captured images.
//!
//! This library provides calibrated color measurement by:
//! - Converting RGB samples to CIELab (D65)
//! - Comparing colors with the CIEDE2000 perceptual difference
//! - Averaging multiple samples while rejecting mis-placed ones
//! - Fitting and applying corrections for systematic capture bias
//!
//! ## Example
//!
//! ```rust,no_run
//! use stamp_colors::{correct, delta_e, rgb_to_lab, CalibrationContext, CorrectionStrategy, RgbColor};
//! use std::path::Path;
//!
//! let context = CalibrationContext::discover(Default::default(), Path::new("."));
//! let sample = correct(RgbColor::new(0.0, 241.0, 9.0), CorrectionStrategy::Dynamic, &context)?;
//! let lab = rgb_to_lab(sample.rgb);
//! println!("{} via {}: {}, ΔE to pure green {:.2}",
//!     sample.rgb, sample.method.name(), lab,
//!     delta_e(lab, rgb_to_lab(RgbColor::new(0.0, 255.0, 0.0))));
//! # Ok::<(), stamp_colors::ColorError>(())
//! ```

use std::collections::BTreeMap;

pub mod calibration;
pub mod color;
pub mod config;
pub mod constants;
pub mod correction;
pub mod error;
pub mod library;
pub mod logger;
pub mod sampling;

pub use calibration::{CalibrationFile, CalibrationMatrix, ChannelCorrection};
pub use color::{AveragingResult, ColorSpaceConverter, ConversionMethod, LabColor, QualityAverager, RgbColor};
pub use config::AnalysisConfig;
pub use correction::{
    correct, correct_batch, CalibrationContext, CalibrationHandle, Corrected, CorrectionStrategy,
};
pub use error::{ColorError, Result};
pub use library::{ReferenceColor, ReferenceLibrary};
pub use sampling::SampleRegion;

/// Convert RGB (0-255) to CIELab with the best available strategy
pub fn rgb_to_lab(rgb: RgbColor) -> LabColor {
    ColorSpaceConverter::new().rgb_to_lab(rgb)
}

/// CIEDE2000 difference between two Lab colors
pub fn delta_e(lab1: LabColor, lab2: LabColor) -> f64 {
    color::delta_e_cie2000(lab1, lab2)
}

/// Average RGB samples with the default outlier threshold
///
/// # Errors
///
/// Returns `ColorError` if the list is empty or a channel is invalid.
pub fn average(samples: &[RgbColor]) -> Result<AveragingResult> {
    for rgb in samples {
        rgb.validate()?;
    }
    let converter = ColorSpaceConverter::new();
    let lab: Vec<LabColor> = samples.iter().map(|rgb| converter.rgb_to_lab(*rgb)).collect();
    QualityAverager::new().average_with_outlier_rejection(&lab, samples)
}

/// Fit an additive correction from named measured and reference colors.
///
/// Returns `Ok(None)` when no name appears in both maps (calibration
/// unavailable).
pub fn fit_calibration(
    measured: &BTreeMap<String, RgbColor>,
    reference: &BTreeMap<String, RgbColor>,
) -> Result<Option<CalibrationMatrix>> {
    let analysis = calibration::analyze_deviation(
        measured,
        reference,
        &config::CalibrationConfig::default(),
    )?;
    Ok(analysis.correction_matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_compose() {
        let measured: BTreeMap<String, RgbColor> =
            [("red".to_string(), RgbColor::new(250.0, 4.0, 3.0))].into();
        let reference: BTreeMap<String, RgbColor> =
            [("red".to_string(), RgbColor::new(255.0, 0.0, 0.0))].into();

        let matrix = fit_calibration(&measured, &reference).unwrap().unwrap();
        let context = CalibrationContext::with_matrix(Default::default(), "test", matrix);
        let corrected = correct(measured["red"], CorrectionStrategy::Dynamic, &context).unwrap();
        assert_eq!(corrected.rgb, reference["red"]);

        let de = delta_e(rgb_to_lab(corrected.rgb), rgb_to_lab(reference["red"]));
        assert_eq!(de, 0.0);
    }

    #[test]
    fn test_average_validates_input() {
        assert!(average(&[]).is_err());
        assert!(average(&[RgbColor::new(300.0, 0.0, 0.0)]).is_err());
        let result = average(&[RgbColor::new(10.0, 20.0, 30.0); 3]).unwrap();
        assert_eq!(result.samples_used, 3);
    }
}
