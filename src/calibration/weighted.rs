//! Reference-weighted calibration
//!
//! Measured swatches are matched to library references by name. The
//! universal correction is the negated category-weighted mean deviation;
//! the per-color fit adds one correction per dominant-channel group.
//! Confidence metrics tell whether a universal correction can be trusted:
//! a low per-channel spread means a consistent bias, a high spread means
//! the bias depends on the color.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::deviation::derive_gain_factors;
use super::matrix::{CalibrationMatrix, ChannelCorrection, DominantChannel};
use crate::color::{delta_e_cie2000, ColorSpaceConverter, RgbColor};
use crate::config::CalibrationConfig;
use crate::constants::calibration::{
    CONSISTENT_STD, FIT_DOMINANCE_MARGIN, METHOD_PER_COLOR, METHOD_WEIGHTED, MODERATE_STD,
    QUALITY_EXCELLENT, QUALITY_FAIR, QUALITY_GOOD,
};
use crate::library::{ColorCategory, ReferenceColor, ReferenceLibrary};
use crate::Result;

/// A measured swatch paired with its reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMeasurement {
    pub name: String,
    pub measured_rgb: RgbColor,
    pub reference: ReferenceColor,
    /// Signed `measured - expected` per channel
    pub deviation_rgb: [f64; 3],
    /// Euclidean norm of `deviation_rgb`
    pub deviation_magnitude: f64,
}

impl CalibrationMeasurement {
    pub fn new(name: impl Into<String>, measured_rgb: RgbColor, reference: ReferenceColor) -> Self {
        let deviation_rgb = measured_rgb.difference(&reference.expected_rgb);
        let deviation_magnitude = deviation_rgb.iter().map(|d| d * d).sum::<f64>().sqrt();
        Self {
            name: name.into(),
            measured_rgb,
            reference,
            deviation_rgb,
            deviation_magnitude,
        }
    }
}

/// Pair each measured swatch with a library reference.
///
/// Names without a reference are skipped with a warning; an empty result
/// means calibration is unavailable.
pub fn measure_reference_colors(
    measured: &BTreeMap<String, RgbColor>,
    library: &ReferenceLibrary,
) -> Result<Vec<CalibrationMeasurement>> {
    let mut measurements = Vec::with_capacity(measured.len());
    for (name, rgb) in measured {
        rgb.validate_finite()?;
        match library.find(name) {
            Some(reference) => {
                let measurement = CalibrationMeasurement::new(name.clone(), *rgb, reference.clone());
                log::debug!(
                    "{} -> {}: deviation ({:+.1}, {:+.1}, {:+.1}), magnitude {:.2}",
                    name,
                    reference.name,
                    measurement.deviation_rgb[0],
                    measurement.deviation_rgb[1],
                    measurement.deviation_rgb[2],
                    measurement.deviation_magnitude
                );
                measurements.push(measurement);
            }
            None => log::warn!("no reference found for '{}', skipping", name),
        }
    }
    Ok(measurements)
}

/// Pass/fail banding of the average deviation magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CalibrationQuality {
    pub fn from_magnitude(avg_magnitude: f64) -> Self {
        if avg_magnitude < QUALITY_EXCELLENT {
            CalibrationQuality::Excellent
        } else if avg_magnitude < QUALITY_GOOD {
            CalibrationQuality::Good
        } else if avg_magnitude < QUALITY_FAIR {
            CalibrationQuality::Fair
        } else {
            CalibrationQuality::Poor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CalibrationQuality::Excellent => "EXCELLENT: very low deviation from references",
            CalibrationQuality::Good => "GOOD: acceptable deviation from references",
            CalibrationQuality::Fair => "FAIR: moderate deviation, consider display calibration",
            CalibrationQuality::Poor => "POOR: high deviation, check display or capture settings",
        }
    }
}

/// Banding of the largest per-channel standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelConsistency {
    Consistent,
    Moderate,
    Inconsistent,
}

impl ChannelConsistency {
    pub fn from_std(max_std: f64) -> Self {
        if max_std < CONSISTENT_STD {
            ChannelConsistency::Consistent
        } else if max_std < MODERATE_STD {
            ChannelConsistency::Moderate
        } else {
            ChannelConsistency::Inconsistent
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChannelConsistency::Consistent => "CONSISTENT: low channel variation",
            ChannelConsistency::Moderate => "MODERATE: some channel inconsistency",
            ChannelConsistency::Inconsistent => {
                "INCONSISTENT: high channel variation, per-color correction recommended"
            }
        }
    }
}

/// Statistics over the measurements behind a fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub sample_count: usize,
    pub primary_colors_used: usize,
    pub neutral_colors_used: usize,
    pub secondary_colors_used: usize,
    /// Unweighted mean deviation per channel
    pub avg_deviation: [f64; 3],
    /// Population standard deviation per channel
    pub std_deviation: [f64; 3],
    /// Largest deviation by absolute value per channel, sign kept
    pub max_deviation: [f64; 3],
    pub avg_magnitude: f64,
    pub max_magnitude: f64,
}

impl ConfidenceMetrics {
    fn from_measurements(measurements: &[CalibrationMeasurement]) -> Self {
        let n = measurements.len() as f64;
        let count = |category| {
            measurements
                .iter()
                .filter(|m| m.reference.category == category)
                .count()
        };

        let mut avg = [0.0; 3];
        let mut max = [0.0_f64; 3];
        for m in measurements {
            for c in 0..3 {
                avg[c] += m.deviation_rgb[c] / n;
                if m.deviation_rgb[c].abs() > max[c].abs() {
                    max[c] = m.deviation_rgb[c];
                }
            }
        }
        let mut std = [0.0; 3];
        for (c, s) in std.iter_mut().enumerate() {
            let variance = measurements
                .iter()
                .map(|m| (m.deviation_rgb[c] - avg[c]).powi(2))
                .sum::<f64>()
                / n;
            *s = variance.sqrt();
        }

        Self {
            sample_count: measurements.len(),
            primary_colors_used: count(ColorCategory::Primary),
            neutral_colors_used: count(ColorCategory::Neutral),
            secondary_colors_used: count(ColorCategory::Secondary),
            avg_deviation: avg,
            std_deviation: std,
            max_deviation: max,
            avg_magnitude: measurements.iter().map(|m| m.deviation_magnitude).sum::<f64>() / n,
            max_magnitude: measurements
                .iter()
                .map(|m| m.deviation_magnitude)
                .fold(0.0, f64::max),
        }
    }

    pub fn max_std(&self) -> f64 {
        self.std_deviation.iter().copied().fold(0.0, f64::max)
    }

    pub fn quality(&self) -> CalibrationQuality {
        CalibrationQuality::from_magnitude(self.avg_magnitude)
    }

    pub fn consistency(&self) -> ChannelConsistency {
        ChannelConsistency::from_std(self.max_std())
    }
}

/// A fitted matrix with the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFit {
    pub method: String,
    pub matrix: CalibrationMatrix,
    pub confidence: ConfidenceMetrics,
}

impl CalibrationFit {
    pub fn report(&self) -> CalibrationReport<'_> {
        CalibrationReport { fit: self }
    }
}

fn category_weight(category: ColorCategory, config: &CalibrationConfig) -> f64 {
    match category {
        ColorCategory::Primary => config.primary_weight,
        ColorCategory::Neutral => config.neutral_weight,
        ColorCategory::Secondary => config.secondary_weight,
    }
}

fn weighted_mean_deviation(measurements: &[CalibrationMeasurement], config: &CalibrationConfig) -> [f64; 3] {
    let mut sum = [0.0; 3];
    let mut total_weight = 0.0;
    for m in measurements {
        let weight = category_weight(m.reference.category, config);
        for (s, d) in sum.iter_mut().zip(m.deviation_rgb) {
            *s += d * weight;
        }
        total_weight += weight;
    }
    if total_weight > 0.0 {
        sum.map(|s| s / total_weight)
    } else {
        log::warn!("all category weights are zero, using the unweighted mean");
        mean_deviation(measurements)
    }
}

fn mean_deviation(measurements: &[CalibrationMeasurement]) -> [f64; 3] {
    let n = measurements.len() as f64;
    measurements.iter().fold([0.0; 3], |mut acc, m| {
        for (a, d) in acc.iter_mut().zip(m.deviation_rgb) {
            *a += d / n;
        }
        acc
    })
}

fn universal_matrix(measurements: &[CalibrationMeasurement], config: &CalibrationConfig) -> CalibrationMatrix {
    let deviation = weighted_mean_deviation(measurements, config);
    let matrix = CalibrationMatrix::additive(ChannelCorrection::cancelling(deviation));
    if config.derive_gain_factors {
        matrix.with_gain(derive_gain_factors(deviation, &config.gain_noise))
    } else {
        matrix
    }
}

/// Fit a universal correction from the category-weighted mean deviation.
///
/// Returns `None` (calibration unavailable) for an empty measurement set.
pub fn weighted_calibration(
    measurements: &[CalibrationMeasurement],
    config: &CalibrationConfig,
) -> Option<CalibrationFit> {
    if measurements.is_empty() {
        log::warn!("no calibration measurements, calibration unavailable");
        return None;
    }
    Some(CalibrationFit {
        method: METHOD_WEIGHTED.to_string(),
        matrix: universal_matrix(measurements, config),
        confidence: ConfidenceMetrics::from_measurements(measurements),
    })
}

/// Weighted universal fit plus one correction per dominant-channel group.
///
/// Measurements are grouped by the dominant channel of their reference
/// color; mixed references form the `neutral_colors` group.
pub fn per_color_calibration(
    measurements: &[CalibrationMeasurement],
    config: &CalibrationConfig,
) -> Option<CalibrationFit> {
    let mut fit = weighted_calibration(measurements, config)?;

    let mut groups: BTreeMap<DominantChannel, Vec<CalibrationMeasurement>> = BTreeMap::new();
    for m in measurements {
        let dominant = DominantChannel::classify(m.reference.expected_rgb, FIT_DOMINANCE_MARGIN);
        groups.entry(dominant).or_default().push(m.clone());
    }
    for (dominant, group) in groups {
        let correction = ChannelCorrection::cancelling(mean_deviation(&group));
        log::debug!(
            "{} group ({} colors): correction {:?}",
            dominant.key(),
            group.len(),
            correction.offsets()
        );
        fit.matrix = fit.matrix.with_per_color(dominant, correction);
    }
    fit.method = METHOD_PER_COLOR.to_string();
    Some(fit)
}

/// Before/after errors for one validated color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorValidation {
    pub name: String,
    pub original_rgb: RgbColor,
    pub corrected_rgb: RgbColor,
    pub expected_rgb: RgbColor,
    /// Euclidean RGB error before correction
    pub original_error: f64,
    /// Euclidean RGB error after correction
    pub corrected_error: f64,
    pub original_delta_e: f64,
    pub corrected_delta_e: f64,
}

impl ColorValidation {
    pub fn improvement(&self) -> f64 {
        self.original_error - self.corrected_error
    }
}

/// Result of [`validate_calibration`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub colors: Vec<ColorValidation>,
    pub avg_original_error: f64,
    pub avg_corrected_error: f64,
    pub avg_original_delta_e: f64,
    pub avg_corrected_delta_e: f64,
    /// Error reduction relative to the original error, in percent
    pub improvement_percentage: f64,
}

fn rgb_distance(a: RgbColor, b: RgbColor) -> f64 {
    a.difference(&b).iter().map(|d| d * d).sum::<f64>().sqrt()
}

/// Apply `matrix` to each measurement and compare with its reference
pub fn validate_calibration(
    matrix: &CalibrationMatrix,
    measurements: &[CalibrationMeasurement],
    converter: &ColorSpaceConverter,
) -> ValidationSummary {
    let colors: Vec<ColorValidation> = measurements
        .iter()
        .map(|m| {
            let expected = m.reference.expected_rgb;
            let corrected = matrix.apply(m.measured_rgb);
            let expected_lab = converter.rgb_to_lab(expected);
            ColorValidation {
                name: m.name.clone(),
                original_rgb: m.measured_rgb,
                corrected_rgb: corrected,
                expected_rgb: expected,
                original_error: rgb_distance(m.measured_rgb, expected),
                corrected_error: rgb_distance(corrected, expected),
                original_delta_e: delta_e_cie2000(converter.rgb_to_lab(m.measured_rgb), expected_lab),
                corrected_delta_e: delta_e_cie2000(converter.rgb_to_lab(corrected), expected_lab),
            }
        })
        .collect();

    if colors.is_empty() {
        return ValidationSummary::default();
    }
    let n = colors.len() as f64;
    let avg = |f: fn(&ColorValidation) -> f64| colors.iter().map(f).sum::<f64>() / n;
    let avg_original_error = avg(|c| c.original_error);
    let avg_corrected_error = avg(|c| c.corrected_error);
    let improvement_percentage = if avg_original_error > 0.0 {
        (avg_original_error - avg_corrected_error) / avg_original_error * 100.0
    } else {
        0.0
    };

    ValidationSummary {
        avg_original_error,
        avg_corrected_error,
        avg_original_delta_e: avg(|c| c.original_delta_e),
        avg_corrected_delta_e: avg(|c| c.corrected_delta_e),
        improvement_percentage,
        colors,
    }
}

/// Human-readable calibration report
pub struct CalibrationReport<'a> {
    fit: &'a CalibrationFit,
}

impl fmt::Display for CalibrationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CalibrationFit {
            method,
            matrix,
            confidence,
        } = self.fit;
        let [std_r, std_g, std_b] = confidence.std_deviation;

        writeln!(f, "=== COLOR CALIBRATION REPORT ===")?;
        writeln!(f)?;
        writeln!(f, "Method: {}", method)?;
        writeln!(f, "Reference colors used: {}", confidence.sample_count)?;
        writeln!(
            f,
            "  primary {}, neutral {}, secondary {}",
            confidence.primary_colors_used,
            confidence.neutral_colors_used,
            confidence.secondary_colors_used
        )?;
        writeln!(f)?;
        writeln!(f, "CHANNEL CORRECTIONS:")?;
        writeln!(f, "  Red:   {:+6.2}", matrix.red_correction)?;
        writeln!(f, "  Green: {:+6.2}", matrix.green_correction)?;
        writeln!(f, "  Blue:  {:+6.2}", matrix.blue_correction)?;
        if let Some(gain) = matrix.multiplicative_factors.filter(|g| !g.is_unity()) {
            writeln!(
                f,
                "  Gain:  red {:.3}, green {:.3}, blue {:.3}",
                gain.red, gain.green, gain.blue
            )?;
        }
        if matrix.has_per_color() {
            writeln!(f)?;
            writeln!(f, "PER-COLOR CORRECTIONS:")?;
            for (key, c) in &matrix.per_color_corrections {
                writeln!(
                    f,
                    "  {:<15} ({:+.1}, {:+.1}, {:+.1})",
                    key, c.red_correction, c.green_correction, c.blue_correction
                )?;
            }
        }
        writeln!(f)?;
        writeln!(f, "CONFIDENCE METRICS:")?;
        writeln!(f, "  Average error magnitude: {:.2}", confidence.avg_magnitude)?;
        writeln!(f, "  Maximum error magnitude: {:.2}", confidence.max_magnitude)?;
        writeln!(
            f,
            "  Channel std deviation:   red {:.2}, green {:.2}, blue {:.2}",
            std_r, std_g, std_b
        )?;
        writeln!(f)?;
        writeln!(f, "QUALITY ASSESSMENT:")?;
        writeln!(f, "  {}", confidence.quality().description())?;
        write!(f, "  {}", confidence.consistency().description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(entries: &[(&str, (f64, f64, f64))]) -> BTreeMap<String, RgbColor> {
        entries
            .iter()
            .map(|(name, (r, g, b))| (name.to_string(), RgbColor::new(*r, *g, *b)))
            .collect()
    }

    fn screenshot_measurements() -> Vec<CalibrationMeasurement> {
        let input = measured(&[
            ("Pure Red", (254.0, 1.0, 0.0)),
            ("Pure Green", (0.0, 255.0, 57.0)),
            ("Pure Blue", (24.0, 17.0, 247.0)),
            ("White", (250.0, 252.0, 246.0)),
            ("Gray 50%", (122.0, 124.0, 118.0)),
        ]);
        measure_reference_colors(&input, &ReferenceLibrary::basic()).unwrap()
    }

    #[test]
    fn test_measurement_deviation() {
        let reference = ReferenceLibrary::basic().find("red").unwrap().clone();
        let m = CalibrationMeasurement::new("red", RgbColor::new(258.0, 4.0, 0.0), reference);
        assert_eq!(m.deviation_rgb, [3.0, 4.0, 0.0]);
        assert!((m.deviation_magnitude - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_unmatched_names_are_skipped() {
        let input = measured(&[("red", (250.0, 0.0, 0.0)), ("teal", (0.0, 128.0, 128.0))]);
        let measurements = measure_reference_colors(&input, &ReferenceLibrary::basic()).unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].reference.name, "Pure Red");
    }

    #[test]
    fn test_empty_measurements_are_unavailable() {
        let config = CalibrationConfig::default();
        assert!(weighted_calibration(&[], &config).is_none());
        assert!(per_color_calibration(&[], &config).is_none());
    }

    #[test]
    fn test_category_weights() {
        let library = ReferenceLibrary::new(
            "mixed",
            vec![
                ReferenceColor::new(
                    "Primary",
                    RgbColor::new(255.0, 0.0, 0.0),
                    crate::color::LabColor::new(53.0, 80.0, 67.0),
                    ColorCategory::Primary,
                ),
                ReferenceColor::new(
                    "Secondary",
                    RgbColor::new(0.0, 255.0, 255.0),
                    crate::color::LabColor::new(91.0, -48.0, -14.0),
                    ColorCategory::Secondary,
                ),
            ],
        );
        let input = measured(&[
            ("Primary", (255.0, 0.0, 0.0)),
            ("Secondary", (30.0, 255.0, 255.0)),
        ]);
        let measurements = measure_reference_colors(&input, &library).unwrap();
        let fit = weighted_calibration(&measurements, &CalibrationConfig::default()).unwrap();

        // 30 * 0.2 / (0.4 + 0.2)
        assert!((fit.matrix.red_correction + 10.0).abs() < 1e-9);
        assert_eq!(fit.method, METHOD_WEIGHTED);
        assert_eq!(fit.confidence.avg_deviation, [15.0, 0.0, 0.0]);
        assert_eq!(fit.confidence.std_deviation, [15.0, 0.0, 0.0]);
        assert_eq!(fit.confidence.secondary_colors_used, 1);
    }

    #[test]
    fn test_confidence_metrics() {
        let measurements = screenshot_measurements();
        let fit = weighted_calibration(&measurements, &CalibrationConfig::default()).unwrap();
        let metrics = &fit.confidence;

        assert_eq!(metrics.sample_count, 5);
        assert_eq!(metrics.primary_colors_used, 3);
        assert_eq!(metrics.neutral_colors_used, 2);
        assert_eq!(metrics.max_deviation, [24.0, 17.0, 57.0]);
        assert_eq!(metrics.quality(), CalibrationQuality::Poor);
        assert_eq!(metrics.consistency(), ChannelConsistency::Inconsistent);
    }

    #[test]
    fn test_per_color_fit_corrects_each_group() {
        let measurements = screenshot_measurements();
        let fit = per_color_calibration(&measurements, &CalibrationConfig::default()).unwrap();
        assert_eq!(fit.method, METHOD_PER_COLOR);

        let green = fit.matrix.per_color(DominantChannel::Green).unwrap();
        assert_eq!(*green, ChannelCorrection::new(0.0, 0.0, -57.0));
        let blue = fit.matrix.per_color(DominantChannel::Blue).unwrap();
        assert_eq!(*blue, ChannelCorrection::new(-24.0, -17.0, 8.0));
        let neutral = fit.matrix.per_color(DominantChannel::Mixed).unwrap();
        assert_eq!(*neutral, ChannelCorrection::new(5.5, 3.5, 9.5));

        // Single-member groups are corrected exactly
        for m in measurements.iter().filter(|m| m.name.starts_with("Pure")) {
            assert_eq!(fit.matrix.apply(m.measured_rgb), m.reference.expected_rgb);
        }
    }

    #[test]
    fn test_validation_shows_improvement() {
        let measurements = screenshot_measurements();
        let fit = per_color_calibration(&measurements, &CalibrationConfig::default()).unwrap();
        let summary = validate_calibration(&fit.matrix, &measurements, &ColorSpaceConverter::new());

        assert_eq!(summary.colors.len(), 5);
        assert!(summary.avg_corrected_error < summary.avg_original_error);
        assert!(summary.avg_corrected_delta_e < summary.avg_original_delta_e);
        assert!(summary.improvement_percentage > 50.0);
        assert!(summary.colors.iter().all(|c| c.improvement() >= 0.0));
    }

    #[test]
    fn test_report_lists_verdicts() {
        let fit = per_color_calibration(&screenshot_measurements(), &CalibrationConfig::default())
            .unwrap();
        let report = fit.report().to_string();
        assert!(report.contains(METHOD_PER_COLOR));
        assert!(report.contains("green_dominant"));
        assert!(report.contains("POOR"));
        assert!(report.contains("INCONSISTENT"));
    }
}
