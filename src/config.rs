//! Configuration structures for stamp color analysis.
//!
//! This module defines all tunable parameters of the color core,
//! organized into groups for conversion, averaging, calibration fitting,
//! correction and library lookup.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use stamp_colors::AnalysisConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = AnalysisConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = AnalysisConfig::default();
//! # Ok::<(), stamp_colors::ColorError>(())
//! ```
//!
//! Missing sections and fields take their defaults; unknown fields are ignored.
//!
//! # Configuration Sections
//!
//! - [`AveragingConfig`]: outlier threshold for sample averaging
//! - [`CalibrationConfig`]: category weights and gain derivation
//! - [`CorrectionConfig`]: default correction profiles and calibration file names
//! - [`LibraryConfig`]: closest-match lookup limits

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calibration::ChannelCorrection;
use crate::color::{ColorSpaceConverter, ConversionMethod, QualityAverager};
use crate::constants::{averaging, calibration, library, profile};
use crate::{ColorError, Result};

/// Complete configuration for the color core.
///
/// Can be serialized to/from JSON so a deployment can carry its own profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// RGB -> Lab strategy, resolved once when a converter is built
    pub conversion: ConversionMethod,

    /// Sample averaging configuration
    pub averaging: AveragingConfig,

    /// Calibration fitting configuration
    pub calibration: CalibrationConfig,

    /// Runtime correction configuration
    pub correction: CorrectionConfig,

    /// Reference library lookup configuration
    pub library: LibraryConfig,
}

/// Averaging parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AveragingConfig {
    /// ΔE00 from the preliminary centroid beyond which a sample is an outlier
    pub outlier_threshold: f64,
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: averaging::OUTLIER_THRESHOLD,
        }
    }
}

/// Calibration fitting parameters.
///
/// Category weights keep a single wildly-off secondary color from
/// dominating the weighted fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub primary_weight: f64,
    pub neutral_weight: f64,
    pub secondary_weight: f64,

    /// Derive multiplicative gain factors alongside the additive correction.
    ///
    /// Off by default: with gain present the additive correction no longer
    /// maps a measured swatch exactly onto its reference.
    pub derive_gain_factors: bool,

    /// Absolute channel deviation below which gain stays at 1.0
    pub gain_noise: ChannelThresholds,
}

/// One threshold per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelThresholds {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            primary_weight: calibration::PRIMARY_WEIGHT,
            neutral_weight: calibration::NEUTRAL_WEIGHT,
            secondary_weight: calibration::SECONDARY_WEIGHT,
            derive_gain_factors: false,
            gain_noise: ChannelThresholds {
                red: calibration::RED_GAIN_NOISE,
                green: calibration::GREEN_GAIN_NOISE,
                blue: calibration::BLUE_GAIN_NOISE,
            },
        }
    }
}

/// Correction profiles used when no calibration is loaded.
///
/// The defaults were fit against one screenshot pipeline and are only a
/// starting profile; recalibrate per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Offsets for the universal strategy
    pub universal: ChannelCorrection,

    /// Margin by which one channel must lead both others to count as dominant
    pub dominance_margin: f64,

    pub red_dominant: ChannelCorrection,
    pub green_dominant: ChannelCorrection,
    pub blue_dominant: ChannelCorrection,

    /// Calibration file names searched for, most specific first
    pub calibration_files: Vec<String>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            universal: profile::UNIVERSAL.into(),
            dominance_margin: profile::DOMINANCE_MARGIN,
            red_dominant: profile::RED_DOMINANT.into(),
            green_dominant: profile::GREEN_DOMINANT.into(),
            blue_dominant: profile::BLUE_DOMINANT.into(),
            calibration_files: profile::CALIBRATION_FILES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

/// Library lookup parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Matches above this ΔE00 are dropped
    pub max_delta_e: f64,
    pub max_results: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_delta_e: library::MAX_DELTA_E,
            max_results: library::MAX_RESULTS,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ColorError::io(path, e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ColorError::serialization(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ColorError::serialization(path, e))?;
        std::fs::write(path, json).map_err(|e| ColorError::io(path, e))?;
        Ok(())
    }

    /// Reject values no computation can use
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("averaging.outlier_threshold", self.averaging.outlier_threshold),
            ("calibration.primary_weight", self.calibration.primary_weight),
            ("calibration.neutral_weight", self.calibration.neutral_weight),
            ("calibration.secondary_weight", self.calibration.secondary_weight),
            ("correction.dominance_margin", self.correction.dominance_margin),
            ("library.max_delta_e", self.library.max_delta_e),
        ];
        for (parameter, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ColorError::invalid_parameter(parameter, value));
            }
        }
        Ok(())
    }

    /// Converter using the configured strategy
    pub fn converter(&self) -> ColorSpaceConverter {
        ColorSpaceConverter::with_method(self.conversion)
    }

    /// Averager using the configured outlier threshold
    pub fn averager(&self) -> Result<QualityAverager> {
        QualityAverager::with_threshold(self.averaging.outlier_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_profile() {
        let config = AnalysisConfig::default();
        assert_eq!(config.averaging.outlier_threshold, 15.0);
        assert_eq!(config.correction.universal, ChannelCorrection::new(-8.0, -6.0, -10.0));
        assert_eq!(config.correction.dominance_margin, 50.0);
        assert_eq!(
            config.correction.calibration_files,
            vec!["calibration_enhanced.json", "calibration.json"]
        );
        assert!(!config.calibration.derive_gain_factors);
        assert_eq!(config.library.max_results, 3);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"averaging": {"outlier_threshold": 8.5}, "conversion": "approximation", "unused": 1}"#,
        )
        .unwrap();
        assert_eq!(config.averaging.outlier_threshold, 8.5);
        assert_eq!(config.conversion, ConversionMethod::Approximation);
        assert_eq!(config.calibration, CalibrationConfig::default());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AnalysisConfig::default();
        config.calibration.derive_gain_factors = true;
        config.correction.universal = ChannelCorrection::new(-1.0, 0.5, 2.0);
        config.to_json_file(&path).unwrap();

        let loaded = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"averaging": {"outlier_threshold": -2}}"#).unwrap();

        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(ColorError::InvalidParameter { .. })
        ));
    }
}
