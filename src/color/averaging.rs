//! Quality-controlled averaging of color samples
//!
//! A plain mean is corrupted by a sample landing on a perforation edge or a
//! shadow. The averager:
//! - takes the simple Lab mean as a preliminary centroid
//! - drops samples whose ΔE00 to that centroid exceeds the threshold
//! - keeps every sample only if none would survive; a single survivor
//!   is returned on its own
//! - averages Lab and RGB channel by channel over the survivors
//!
//! Output depends only on the input values and their order.

use serde::{Deserialize, Serialize};

use super::delta_e::delta_e_cie2000;
use super::model::{mean_rgb, LabColor, RgbColor};
use crate::constants::averaging::OUTLIER_THRESHOLD;
use crate::{ColorError, Result};

/// Result of one averaging call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragingResult {
    /// Mean RGB of retained samples, unrounded
    pub avg_rgb: RgbColor,
    /// Mean Lab of retained samples
    pub avg_lab: LabColor,
    /// Largest ΔE00 from a retained sample to `avg_lab`
    pub max_delta_e: f64,
    pub samples_used: usize,
    pub outliers_excluded: usize,
}

impl AveragingResult {
    /// One-line quality summary for display next to the averaged value
    pub fn quality_summary(&self) -> String {
        let total = self.samples_used + self.outliers_excluded;
        let mut summary = format!(
            "ΔE max: {:.2}, used {}/{} samples",
            self.max_delta_e, self.samples_used, total
        );
        if self.outliers_excluded > 0 {
            summary.push_str(&format!(", {} outliers excluded", self.outliers_excluded));
        }
        summary
    }
}

/// Averager with a configurable outlier threshold
#[derive(Debug, Clone, Copy)]
pub struct QualityAverager {
    outlier_threshold: f64,
}

impl Default for QualityAverager {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityAverager {
    /// Create an averager with the default ΔE00 threshold
    pub fn new() -> Self {
        Self {
            outlier_threshold: OUTLIER_THRESHOLD,
        }
    }

    /// Create an averager with a custom ΔE00 threshold
    pub fn with_threshold(outlier_threshold: f64) -> Result<Self> {
        if !outlier_threshold.is_finite() || outlier_threshold < 0.0 {
            return Err(ColorError::invalid_parameter(
                "outlier_threshold",
                outlier_threshold,
            ));
        }
        Ok(Self { outlier_threshold })
    }

    pub fn outlier_threshold(&self) -> f64 {
        self.outlier_threshold
    }

    /// Average paired (Lab, RGB) samples with ΔE-based outlier rejection
    ///
    /// # Errors
    ///
    /// - `SampleCountMismatch` if the two lists differ in length
    /// - `NoSamples` if both are empty
    /// - `InvalidChannel` if any RGB channel is not finite
    pub fn average_with_outlier_rejection(
        &self,
        lab_values: &[LabColor],
        rgb_values: &[RgbColor],
    ) -> Result<AveragingResult> {
        if lab_values.len() != rgb_values.len() {
            return Err(ColorError::SampleCountMismatch {
                lab: lab_values.len(),
                rgb: rgb_values.len(),
            });
        }
        for rgb in rgb_values {
            rgb.validate_finite()?;
        }
        let centroid = LabColor::mean(lab_values).ok_or(ColorError::NoSamples)?;

        let keep: Vec<bool> = lab_values
            .iter()
            .map(|lab| delta_e_cie2000(*lab, centroid) <= self.outlier_threshold)
            .collect();
        let survivors = keep.iter().filter(|k| **k).count();

        let keep = if survivors == 0 {
            log::debug!(
                "no sample of {} within ΔE {:.1} of centroid, keeping all",
                lab_values.len(),
                self.outlier_threshold
            );
            vec![true; lab_values.len()]
        } else {
            keep
        };

        let retained_lab: Vec<LabColor> = select(lab_values, &keep);
        let retained_rgb: Vec<RgbColor> = select(rgb_values, &keep);
        let samples_used = retained_lab.len();
        let outliers_excluded = lab_values.len() - samples_used;

        // Both vectors are non-empty: at least one sample is kept.
        let avg_lab = LabColor::mean(&retained_lab).ok_or(ColorError::NoSamples)?;
        let avg_rgb = mean_rgb(&retained_rgb).ok_or(ColorError::NoSamples)?;

        let max_delta_e = retained_lab
            .iter()
            .map(|lab| delta_e_cie2000(*lab, avg_lab))
            .fold(0.0, f64::max);

        if outliers_excluded > 0 {
            log::debug!(
                "excluded {} outlier(s) beyond ΔE {:.1}",
                outliers_excluded,
                self.outlier_threshold
            );
        }

        Ok(AveragingResult {
            avg_rgb,
            avg_lab,
            max_delta_e,
            samples_used,
            outliers_excluded,
        })
    }
}

fn select<T: Copy>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter_map(|(value, keep)| keep.then_some(*value))
        .collect()
}
