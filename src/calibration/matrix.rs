//! Calibration matrix: additive per-channel offsets, optional per-dominant
//! color offsets and optional per-channel gain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::RgbColor;
use crate::constants::calibration::FIT_DOMINANCE_MARGIN;

/// Additive offsets for the three channels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelCorrection {
    pub red_correction: f64,
    pub green_correction: f64,
    pub blue_correction: f64,
}

impl ChannelCorrection {
    pub const fn new(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red_correction: red,
            green_correction: green,
            blue_correction: blue,
        }
    }

    /// The correction that cancels a measured `measured - reference` deviation
    pub fn cancelling(deviation: [f64; 3]) -> Self {
        Self::new(-deviation[0], -deviation[1], -deviation[2])
    }

    pub fn offsets(&self) -> [f64; 3] {
        [self.red_correction, self.green_correction, self.blue_correction]
    }

    /// Add the offsets; no clamping
    pub fn offset(&self, rgb: RgbColor) -> RgbColor {
        RgbColor::new(
            rgb.r + self.red_correction,
            rgb.g + self.green_correction,
            rgb.b + self.blue_correction,
        )
    }

    /// Add the offsets, then clamp and round
    pub fn apply(&self, rgb: RgbColor) -> RgbColor {
        self.offset(rgb).to_display()
    }
}

impl From<[f64; 3]> for ChannelCorrection {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self::new(r, g, b)
    }
}

fn unit_gain() -> f64 {
    1.0
}

/// Per-channel gain applied after the additive term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainFactors {
    #[serde(default = "unit_gain")]
    pub red: f64,
    #[serde(default = "unit_gain")]
    pub green: f64,
    #[serde(default = "unit_gain")]
    pub blue: f64,
}

impl Default for GainFactors {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
        }
    }
}

impl GainFactors {
    pub fn scale(&self, rgb: RgbColor) -> RgbColor {
        RgbColor::new(rgb.r * self.red, rgb.g * self.green, rgb.b * self.blue)
    }

    pub fn is_unity(&self) -> bool {
        self.red == 1.0 && self.green == 1.0 && self.blue == 1.0
    }
}

/// Which channel, if any, dominates a color by a fixed margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantChannel {
    Red,
    Green,
    Blue,
    /// No channel leads the other two by the margin
    Mixed,
}

impl DominantChannel {
    /// Classify by whether one channel exceeds both others by `margin`
    pub fn classify(rgb: RgbColor, margin: f64) -> Self {
        let RgbColor { r, g, b } = rgb;
        if r > g + margin && r > b + margin {
            DominantChannel::Red
        } else if g > r + margin && g > b + margin {
            DominantChannel::Green
        } else if b > r + margin && b > g + margin {
            DominantChannel::Blue
        } else {
            DominantChannel::Mixed
        }
    }

    /// Key used under `per_color_corrections` in calibration files
    pub fn key(&self) -> &'static str {
        match self {
            DominantChannel::Red => "red_dominant",
            DominantChannel::Green => "green_dominant",
            DominantChannel::Blue => "blue_dominant",
            DominantChannel::Mixed => "neutral_colors",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DominantChannel::Red => "Red-dominant",
            DominantChannel::Green => "Green-dominant",
            DominantChannel::Blue => "Blue-dominant",
            DominantChannel::Mixed => "Mixed",
        }
    }
}

/// Correction derived from measured-vs-reference swatches.
///
/// Immutable once built; recalibration produces a new matrix.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationMatrix {
    #[serde(default)]
    pub red_correction: f64,
    #[serde(default)]
    pub green_correction: f64,
    #[serde(default)]
    pub blue_correction: f64,
    /// Offsets keyed by [`DominantChannel::key`]; unknown keys are kept but unused
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_color_corrections: BTreeMap<String, ChannelCorrection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicative_factors: Option<GainFactors>,
}

impl CalibrationMatrix {
    /// Additive-only matrix
    pub fn additive(correction: ChannelCorrection) -> Self {
        Self {
            red_correction: correction.red_correction,
            green_correction: correction.green_correction,
            blue_correction: correction.blue_correction,
            ..Self::default()
        }
    }

    pub fn with_gain(mut self, gain: GainFactors) -> Self {
        self.multiplicative_factors = Some(gain);
        self
    }

    pub fn with_per_color(mut self, dominant: DominantChannel, correction: ChannelCorrection) -> Self {
        self.per_color_corrections
            .insert(dominant.key().to_string(), correction);
        self
    }

    /// The universal additive term
    pub fn universal(&self) -> ChannelCorrection {
        ChannelCorrection::new(self.red_correction, self.green_correction, self.blue_correction)
    }

    pub fn per_color(&self, dominant: DominantChannel) -> Option<&ChannelCorrection> {
        self.per_color_corrections.get(dominant.key())
    }

    pub fn has_per_color(&self) -> bool {
        !self.per_color_corrections.is_empty()
    }

    /// Per-dominant offsets for this input, falling back to `neutral_colors`.
    ///
    /// `None` when the matrix has no entry that applies.
    fn per_color_offsets(&self, rgb: RgbColor) -> Option<ChannelCorrection> {
        if !self.has_per_color() {
            return None;
        }
        let dominant = DominantChannel::classify(rgb, FIT_DOMINANCE_MARGIN);
        self.per_color(dominant)
            .or_else(|| self.per_color(DominantChannel::Mixed))
            .copied()
    }

    /// Additive term for this input: the per-dominant offsets when present,
    /// then `neutral_colors`, then the universal term.
    pub fn offsets_for(&self, rgb: RgbColor) -> ChannelCorrection {
        self.per_color_offsets(rgb)
            .unwrap_or_else(|| self.universal())
    }

    /// Apply the correction without clamping.
    ///
    /// Gain follows the universal term only; a per-color entry is applied
    /// on its own.
    pub fn adjust(&self, rgb: RgbColor) -> RgbColor {
        if let Some(offsets) = self.per_color_offsets(rgb) {
            return offsets.offset(rgb);
        }
        let shifted = self.universal().offset(rgb);
        match &self.multiplicative_factors {
            Some(gain) => gain.scale(shifted),
            None => shifted,
        }
    }

    /// Apply the correction; clamping and rounding happen only here
    pub fn apply(&self, rgb: RgbColor) -> RgbColor {
        self.adjust(rgb).to_display()
    }
}
