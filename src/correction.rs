//! Runtime bias correction
//!
//! A [`CalibrationContext`] holds the correction profile and, when one was
//! loaded, the session's calibration matrix. It is never mutated:
//! recalibration builds a new context and swaps it into a
//! [`CalibrationHandle`], so a correction call always sees one whole matrix.

use arc_swap::ArcSwap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::calibration::{CalibrationFile, CalibrationMatrix, DominantChannel};
use crate::color::RgbColor;
use crate::config::CorrectionConfig;
use crate::{ColorError, Result};

/// Correction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStrategy {
    /// Fixed per-channel offsets from the profile
    #[default]
    Universal,
    /// The loaded calibration matrix, universal when none is loaded
    Dynamic,
    /// Offsets chosen by the input's dominant channel, universal for mixed input
    PerColorDominant,
}

impl CorrectionStrategy {
    pub const ALL: [CorrectionStrategy; 3] = [
        CorrectionStrategy::Universal,
        CorrectionStrategy::Dynamic,
        CorrectionStrategy::PerColorDominant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStrategy::Universal => "universal",
            CorrectionStrategy::Dynamic => "dynamic",
            CorrectionStrategy::PerColorDominant => "per_color_dominant",
        }
    }
}

impl fmt::Display for CorrectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionStrategy {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ColorError::invalid_parameter("strategy", s))
    }
}

/// Which correction was actually applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedCorrection {
    Universal,
    /// A loaded calibration, named by its method
    Calibrated(String),
    /// Dynamic was requested but the session is uncalibrated
    UncalibratedFallback,
    Dominant(DominantChannel),
    /// Per-color was requested but no channel dominates
    MixedFallback,
}

impl AppliedCorrection {
    pub fn name(&self) -> String {
        match self {
            AppliedCorrection::Universal => "Universal".to_string(),
            AppliedCorrection::Calibrated(method) => format!("Dynamic ({})", method),
            AppliedCorrection::UncalibratedFallback => {
                "Universal (no calibration loaded)".to_string()
            }
            AppliedCorrection::Dominant(dominant) => format!("{} correction", dominant.label()),
            AppliedCorrection::MixedFallback => "Universal (mixed color)".to_string(),
        }
    }
}

/// Raw and corrected values side by side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corrected {
    pub raw: RgbColor,
    /// Clamped and rounded
    pub rgb: RgbColor,
    pub method: AppliedCorrection,
}

/// Calibration state of a session
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Calibration {
    #[default]
    Uncalibrated,
    Loaded {
        method: String,
        matrix: CalibrationMatrix,
        source: Option<PathBuf>,
    },
}

/// Everything a correction call reads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationContext {
    profile: CorrectionConfig,
    calibration: Calibration,
}

impl CalibrationContext {
    pub fn uncalibrated(profile: CorrectionConfig) -> Self {
        Self {
            profile,
            calibration: Calibration::Uncalibrated,
        }
    }

    pub fn with_matrix(
        profile: CorrectionConfig,
        method: impl Into<String>,
        matrix: CalibrationMatrix,
    ) -> Self {
        Self {
            profile,
            calibration: Calibration::Loaded {
                method: method.into(),
                matrix,
                source: None,
            },
        }
    }

    /// Context from a calibration file; unreadable files give an
    /// uncalibrated context.
    pub fn from_file(profile: CorrectionConfig, path: &Path) -> Self {
        match CalibrationFile::load_or_warn(path) {
            Some(file) => Self {
                profile,
                calibration: Calibration::Loaded {
                    method: file.method().to_string(),
                    matrix: file.into_matrix(),
                    source: Some(path.to_path_buf()),
                },
            },
            None => Self::uncalibrated(profile),
        }
    }

    /// Try the profile's calibration file names in `dir`, first usable wins
    pub fn discover(profile: CorrectionConfig, dir: &Path) -> Self {
        for name in &profile.calibration_files {
            let path = dir.join(name);
            if let Some(file) = CalibrationFile::load_or_warn(&path) {
                log::info!("using calibration {}", path.display());
                return Self {
                    profile,
                    calibration: Calibration::Loaded {
                        method: file.method().to_string(),
                        matrix: file.into_matrix(),
                        source: Some(path),
                    },
                };
            }
        }
        log::debug!("no calibration found in {}, running uncalibrated", dir.display());
        Self::uncalibrated(profile)
    }

    pub fn profile(&self) -> &CorrectionConfig {
        &self.profile
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn matrix(&self) -> Option<&CalibrationMatrix> {
        match &self.calibration {
            Calibration::Loaded { matrix, .. } => Some(matrix),
            Calibration::Uncalibrated => None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.matrix().is_some()
    }

    /// Same profile, new calibration
    pub fn recalibrated(&self, method: impl Into<String>, matrix: CalibrationMatrix) -> Self {
        Self::with_matrix(self.profile.clone(), method, matrix)
    }
}

/// Correct one raw sample.
///
/// Rejects channels outside 0-255; the output is always clamped.
pub fn correct(rgb: RgbColor, strategy: CorrectionStrategy, context: &CalibrationContext) -> Result<Corrected> {
    rgb.validate()?;
    let profile = context.profile();

    let (corrected, method) = match strategy {
        CorrectionStrategy::Universal => (profile.universal.apply(rgb), AppliedCorrection::Universal),
        CorrectionStrategy::Dynamic => match &context.calibration {
            Calibration::Loaded { method, matrix, .. } => {
                (matrix.apply(rgb), AppliedCorrection::Calibrated(method.clone()))
            }
            Calibration::Uncalibrated => (
                profile.universal.apply(rgb),
                AppliedCorrection::UncalibratedFallback,
            ),
        },
        CorrectionStrategy::PerColorDominant => {
            let dominant = DominantChannel::classify(rgb, profile.dominance_margin);
            let offsets = match dominant {
                DominantChannel::Red => &profile.red_dominant,
                DominantChannel::Green => &profile.green_dominant,
                DominantChannel::Blue => &profile.blue_dominant,
                DominantChannel::Mixed => &profile.universal,
            };
            let method = match dominant {
                DominantChannel::Mixed => AppliedCorrection::MixedFallback,
                dominant => AppliedCorrection::Dominant(dominant),
            };
            (offsets.apply(rgb), method)
        }
    };

    Ok(Corrected {
        raw: rgb,
        rgb: corrected,
        method,
    })
}

/// Correct many samples in parallel; output keeps input order
pub fn correct_batch(
    samples: &[RgbColor],
    strategy: CorrectionStrategy,
    context: &CalibrationContext,
) -> Result<Vec<Corrected>> {
    samples
        .par_iter()
        .map(|rgb| correct(*rgb, strategy, context))
        .collect()
}

/// Shared, atomically replaceable calibration context
#[derive(Debug)]
pub struct CalibrationHandle {
    current: ArcSwap<CalibrationContext>,
}

impl Default for CalibrationHandle {
    fn default() -> Self {
        Self::new(CalibrationContext::default())
    }
}

impl CalibrationHandle {
    pub fn new(context: CalibrationContext) -> Self {
        Self {
            current: ArcSwap::from_pointee(context),
        }
    }

    /// The context current at the time of the call
    pub fn snapshot(&self) -> Arc<CalibrationContext> {
        self.current.load_full()
    }

    pub fn replace(&self, context: CalibrationContext) {
        self.current.store(Arc::new(context));
    }

    /// Persist a new calibration, then make it current.
    ///
    /// If saving fails the current context stays in place.
    pub fn install(&self, file: &CalibrationFile, path: &Path) -> Result<()> {
        file.save(path)?;
        let mut next = self
            .snapshot()
            .recalibrated(file.method(), file.matrix().clone());
        if let Calibration::Loaded { source, .. } = &mut next.calibration {
            *source = Some(path.to_path_buf());
        }
        self.replace(next);
        Ok(())
    }

    pub fn correct(&self, rgb: RgbColor, strategy: CorrectionStrategy) -> Result<Corrected> {
        correct(rgb, strategy, &self.snapshot())
    }

    pub fn correct_batch(&self, samples: &[RgbColor], strategy: CorrectionStrategy) -> Result<Vec<Corrected>> {
        correct_batch(samples, strategy, &self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::ChannelCorrection;
    use tempfile::TempDir;

    fn uncalibrated() -> CalibrationContext {
        CalibrationContext::uncalibrated(CorrectionConfig::default())
    }

    fn calibrated(correction: ChannelCorrection) -> CalibrationContext {
        CalibrationContext::with_matrix(
            CorrectionConfig::default(),
            "test",
            CalibrationMatrix::additive(correction),
        )
    }

    #[test]
    fn test_universal_profile() {
        let out = correct(RgbColor::new(100.0, 100.0, 100.0), CorrectionStrategy::Universal, &uncalibrated())
            .unwrap();
        assert_eq!(out.rgb, RgbColor::new(92.0, 94.0, 90.0));
        assert_eq!(out.raw, RgbColor::new(100.0, 100.0, 100.0));
        assert_eq!(out.method, AppliedCorrection::Universal);
    }

    #[test]
    fn test_dynamic_without_matrix_falls_back() {
        let out = correct(RgbColor::new(100.0, 100.0, 100.0), CorrectionStrategy::Dynamic, &uncalibrated())
            .unwrap();
        assert_eq!(out.rgb, RgbColor::new(92.0, 94.0, 90.0));
        assert_eq!(out.method, AppliedCorrection::UncalibratedFallback);
    }

    #[test]
    fn test_dynamic_clamps() {
        let context = calibrated(ChannelCorrection::new(-10.0, -10.0, -10.0));
        let out = correct(RgbColor::new(2.0, 2.0, 2.0), CorrectionStrategy::Dynamic, &context).unwrap();
        assert_eq!(out.rgb, RgbColor::BLACK);
        assert_eq!(out.method, AppliedCorrection::Calibrated("test".to_string()));
    }

    #[test]
    fn test_per_color_dominant() {
        let context = uncalibrated();
        let green = correct(RgbColor::new(0.0, 255.0, 57.0), CorrectionStrategy::PerColorDominant, &context)
            .unwrap();
        assert_eq!(green.rgb, RgbColor::new(0.0, 255.0, 20.0));
        assert_eq!(green.method, AppliedCorrection::Dominant(DominantChannel::Green));

        let blue = correct(RgbColor::new(24.0, 17.0, 247.0), CorrectionStrategy::PerColorDominant, &context)
            .unwrap();
        assert_eq!(blue.rgb, RgbColor::new(0.0, 0.0, 247.0));

        let mixed = correct(RgbColor::new(120.0, 110.0, 100.0), CorrectionStrategy::PerColorDominant, &context)
            .unwrap();
        assert_eq!(mixed.rgb, RgbColor::new(112.0, 104.0, 90.0));
        assert_eq!(mixed.method, AppliedCorrection::MixedFallback);
    }

    #[test]
    fn test_out_of_range_input_is_rejected() {
        for strategy in CorrectionStrategy::ALL {
            assert!(correct(RgbColor::new(256.0, 0.0, 0.0), strategy, &uncalibrated()).is_err());
            assert!(correct(RgbColor::new(0.0, f64::NAN, 0.0), strategy, &uncalibrated()).is_err());
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("universal".parse::<CorrectionStrategy>().unwrap(), CorrectionStrategy::Universal);
        assert_eq!(
            "per-color-dominant".parse::<CorrectionStrategy>().unwrap(),
            CorrectionStrategy::PerColorDominant
        );
        assert_eq!(" Dynamic ".parse::<CorrectionStrategy>().unwrap(), CorrectionStrategy::Dynamic);
        assert!("auto".parse::<CorrectionStrategy>().is_err());
    }

    #[test]
    fn test_batch_keeps_order() {
        let samples: Vec<RgbColor> = (0..200)
            .map(|i| RgbColor::new(f64::from(i), 128.0, 255.0 - f64::from(i)))
            .collect();
        let context = calibrated(ChannelCorrection::new(1.0, 0.0, -1.0));
        let corrected = correct_batch(&samples, CorrectionStrategy::Dynamic, &context).unwrap();
        assert_eq!(corrected.len(), samples.len());
        for (out, raw) in corrected.iter().zip(&samples) {
            assert_eq!(out.raw, *raw);
        }
    }

    #[test]
    fn test_discover_prefers_enhanced_file() {
        let dir = TempDir::new().unwrap();
        let plain = CalibrationFile::new(
            "average_deviation_calibration",
            CalibrationMatrix::additive(ChannelCorrection::new(1.0, 1.0, 1.0)),
        );
        plain.save(&dir.path().join("calibration.json")).unwrap();

        let context = CalibrationContext::discover(CorrectionConfig::default(), dir.path());
        assert_eq!(context.matrix(), Some(plain.matrix()));

        std::fs::write(dir.path().join("calibration_enhanced.json"), "garbage").unwrap();
        let context = CalibrationContext::discover(CorrectionConfig::default(), dir.path());
        assert_eq!(context.matrix(), Some(plain.matrix()));

        let enhanced = CalibrationFile::new(
            "enhanced_per_color_correction",
            CalibrationMatrix::additive(ChannelCorrection::new(2.0, 2.0, 2.0)),
        );
        enhanced.save(&dir.path().join("calibration_enhanced.json")).unwrap();
        let context = CalibrationContext::discover(CorrectionConfig::default(), dir.path());
        assert_eq!(context.matrix(), Some(enhanced.matrix()));
    }

    #[test]
    fn test_missing_file_is_uncalibrated() {
        let dir = TempDir::new().unwrap();
        let context = CalibrationContext::from_file(CorrectionConfig::default(), &dir.path().join("none.json"));
        assert!(!context.is_calibrated());
    }

    #[test]
    fn test_handle_snapshot_survives_replace() {
        let handle = CalibrationHandle::new(calibrated(ChannelCorrection::new(5.0, 5.0, 5.0)));
        let before = handle.snapshot();

        handle.replace(calibrated(ChannelCorrection::new(-5.0, -5.0, -5.0)));
        let probe = RgbColor::new(100.0, 100.0, 100.0);

        assert_eq!(
            correct(probe, CorrectionStrategy::Dynamic, &before).unwrap().rgb,
            RgbColor::new(105.0, 105.0, 105.0)
        );
        assert_eq!(
            handle.correct(probe, CorrectionStrategy::Dynamic).unwrap().rgb,
            RgbColor::new(95.0, 95.0, 95.0)
        );
    }

    #[test]
    fn test_handle_install_persists_then_swaps() {
        let dir = TempDir::new().unwrap();
        let handle = CalibrationHandle::default();
        let file = CalibrationFile::new(
            "weighted_reference_calibration",
            CalibrationMatrix::additive(ChannelCorrection::new(0.0, 3.0, 0.0)),
        );

        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();
        assert!(handle.install(&file, &blocked).is_err());
        assert!(!handle.snapshot().is_calibrated());

        let path = dir.path().join("calibration.json");
        handle.install(&file, &path).unwrap();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.matrix(), Some(file.matrix()));
        assert_eq!(CalibrationFile::load(&path).unwrap(), file);
    }
}
