//! Calibration against reference colors
//!
//! Derives correction matrices from measured-vs-reference swatches,
//! reports how far they can be trusted, and persists them.

pub mod deviation;
pub mod matrix;
pub mod store;
pub mod weighted;

pub use deviation::{analyze_deviation, ColorDeviation, DeviationAnalysis};
pub use matrix::{CalibrationMatrix, ChannelCorrection, DominantChannel, GainFactors};
pub use store::{CalibrationFile, CalibrationRecord, WizardData};
pub use weighted::{
    measure_reference_colors, per_color_calibration, validate_calibration, weighted_calibration,
    CalibrationFit, CalibrationMeasurement, CalibrationQuality, CalibrationReport,
    ChannelConsistency, ConfidenceMetrics, ValidationSummary,
};
