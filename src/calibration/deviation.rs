//! Average-deviation calibration
//!
//! The quick path: compare named measured swatches against named
//! references, average the signed per-channel deviation and negate it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::matrix::{CalibrationMatrix, ChannelCorrection, GainFactors};
use crate::color::RgbColor;
use crate::config::{CalibrationConfig, ChannelThresholds};
use crate::constants::calibration::{
    BLUE_RECOMMENDATION, GREEN_RECOMMENDATION, RED_RECOMMENDATION,
};
use crate::constants::CHANNEL_MAX;
use crate::Result;

/// Deviation of one named swatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorDeviation {
    pub measured: RgbColor,
    pub reference: RgbColor,
    /// Signed `measured - reference` per channel
    pub deviation: [f64; 3],
    /// Sum of absolute channel deviations
    pub total_deviation: f64,
}

impl ColorDeviation {
    pub fn new(measured: RgbColor, reference: RgbColor) -> Self {
        let deviation = measured.difference(&reference);
        Self {
            measured,
            reference,
            deviation,
            total_deviation: deviation.iter().map(|d| d.abs()).sum(),
        }
    }
}

/// Output of [`analyze_deviation`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviationAnalysis {
    pub deviations: BTreeMap<String, ColorDeviation>,
    /// `None` when no name appears in both maps
    pub avg_deviation: Option<[f64; 3]>,
    /// `None` when calibration is unavailable
    pub correction_matrix: Option<CalibrationMatrix>,
    pub recommendations: Vec<String>,
}

impl DeviationAnalysis {
    pub fn is_available(&self) -> bool {
        self.correction_matrix.is_some()
    }
}

/// Compare measured swatches with references of the same name.
///
/// Measured values may lie outside 0-255 (a capture pipeline can
/// overshoot) but must be finite. Names missing from either map are
/// skipped.
pub fn analyze_deviation(
    measured: &BTreeMap<String, RgbColor>,
    reference: &BTreeMap<String, RgbColor>,
    config: &CalibrationConfig,
) -> Result<DeviationAnalysis> {
    let mut analysis = DeviationAnalysis::default();

    for (name, measured_rgb) in measured {
        measured_rgb.validate_finite()?;
        let Some(reference_rgb) = reference.get(name) else {
            log::warn!("no reference color named '{}', skipping", name);
            continue;
        };
        let deviation = ColorDeviation::new(*measured_rgb, *reference_rgb);
        log::debug!(
            "{}: expected {:.0} measured {:.0} deviation ({:+.0}, {:+.0}, {:+.0})",
            name,
            reference_rgb,
            measured_rgb,
            deviation.deviation[0],
            deviation.deviation[1],
            deviation.deviation[2]
        );
        analysis.deviations.insert(name.clone(), deviation);
    }

    if analysis.deviations.is_empty() {
        log::warn!("no measured color matched a reference, calibration unavailable");
        return Ok(analysis);
    }

    let n = analysis.deviations.len() as f64;
    let mut avg = [0.0; 3];
    for deviation in analysis.deviations.values() {
        for (sum, d) in avg.iter_mut().zip(deviation.deviation) {
            *sum += d;
        }
    }
    let avg = avg.map(|sum| sum / n);

    let mut matrix = CalibrationMatrix::additive(ChannelCorrection::cancelling(avg));
    if config.derive_gain_factors {
        matrix = matrix.with_gain(derive_gain_factors(avg, &config.gain_noise));
    }

    analysis.recommendations = recommendations(avg);
    analysis.avg_deviation = Some(avg);
    analysis.correction_matrix = Some(matrix);
    Ok(analysis)
}

/// Gain per channel: unity below the noise threshold, otherwise
/// `(255 - |d|) / 255`; a negative blue deviation scales up instead.
pub fn derive_gain_factors(avg_deviation: [f64; 3], noise: &ChannelThresholds) -> GainFactors {
    let [r, g, b] = avg_deviation;
    let shrink = |d: f64, threshold: f64| {
        if d.abs() < threshold {
            1.0
        } else {
            (CHANNEL_MAX - d.abs()) / CHANNEL_MAX
        }
    };
    let blue = if b.abs() < noise.blue {
        1.0
    } else if b < 0.0 {
        (CHANNEL_MAX + b.abs()) / CHANNEL_MAX
    } else {
        (CHANNEL_MAX - b.abs()) / CHANNEL_MAX
    };
    GainFactors {
        red: shrink(r, noise.red),
        green: shrink(g, noise.green),
        blue,
    }
}

/// Advisory hints triggered by the average channel deviation
pub fn recommendations(avg_deviation: [f64; 3]) -> Vec<String> {
    let [r, g, b] = avg_deviation;
    let mut hints = Vec::new();

    if g.abs() > GREEN_RECOMMENDATION {
        hints.push(if g > 0.0 {
            "Green channel is consistently high, possibly a display or screenshot issue"
        } else {
            "Green channel is consistently low"
        });
    }
    if b.abs() > BLUE_RECOMMENDATION {
        hints.push(if b < 0.0 {
            "Blue channel deficit, typical of screenshot capture"
        } else {
            "Blue channel is consistently high"
        });
    }
    if r.abs() > RED_RECOMMENDATION {
        hints.push(if r > 0.0 {
            "Red channel is slightly high"
        } else {
            "Red channel is slightly low"
        });
    }

    hints.into_iter().map(String::from).collect()
}
