//! Colorimetric constants and calibration defaults
//!
//! This module contains compile-time constants for color conversion,
//! color-difference banding and the default correction profiles.

/// D65 Standard Illuminant Reference
///
/// CIE Standard Illuminant D65 represents average daylight with a correlated
/// color temperature of 6504K. This is the standard reference for digital
/// images and computer displays.
pub mod d65 {
    /// D65 white point in CIE XYZ color space (Y normalized to 1.0)
    /// Source: CIE 15:2004 Colorimetry, 3rd edition
    pub const WHITE_POINT_XYZ: [f64; 3] = [0.95047, 1.00000, 1.08883];
}

/// sRGB (linear) to CIE XYZ, D65 reference white
pub const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// CIE XYZ to sRGB (linear), inverse of [`SRGB_TO_XYZ`]
pub const XYZ_TO_SRGB: [[f64; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// CIE L*a*b* nonlinearity constants (1976 rounded form)
pub mod cie {
    /// Threshold between the cube-root and linear segments
    pub const EPSILON: f64 = 0.008856;
    /// Slope of the linear segment
    pub const LINEAR_SLOPE: f64 = 7.787;
    /// Offset of the linear segment
    pub const LINEAR_OFFSET: f64 = 16.0 / 116.0;
}

/// sRGB transfer function constants
pub mod srgb {
    /// Encoded value below which decoding is linear
    pub const DECODE_THRESHOLD: f64 = 0.04045;
    /// Linear value below which encoding is linear
    pub const ENCODE_THRESHOLD: f64 = 0.0031308;
    pub const LINEAR_SCALE: f64 = 12.92;
    pub const GAMMA: f64 = 2.4;
    pub const ALPHA: f64 = 0.055;
}

/// Maximum value of an 8-bit display channel
pub const CHANNEL_MAX: f64 = 255.0;

/// ΔE00 perceptual bands
pub mod delta_e {
    /// Below this the difference is imperceptible
    pub const IMPERCEPTIBLE: f64 = 1.0;
    /// Below this the difference needs close inspection
    pub const CLOSE_INSPECTION: f64 = 2.0;
    /// Below this the difference is visible at a glance; above, distinct colors
    pub const AT_A_GLANCE: f64 = 10.0;

    /// Library match quality bands
    pub const MATCH_EXCELLENT: f64 = 1.0;
    pub const MATCH_GOOD: f64 = 2.5;
    pub const MATCH_FAIR: f64 = 5.0;
}

/// Averaging parameters
pub mod averaging {
    /// Default ΔE00 distance from the preliminary centroid beyond which a
    /// sample is treated as mis-placed
    pub const OUTLIER_THRESHOLD: f64 = 15.0;
}

/// Calibration fitting parameters
pub mod calibration {
    /// Category weights for the weighted fit
    pub const PRIMARY_WEIGHT: f64 = 0.4;
    pub const NEUTRAL_WEIGHT: f64 = 0.4;
    pub const SECONDARY_WEIGHT: f64 = 0.2;

    /// Below these absolute deviations a channel keeps unit gain
    pub const RED_GAIN_NOISE: f64 = 3.0;
    pub const GREEN_GAIN_NOISE: f64 = 5.0;
    pub const BLUE_GAIN_NOISE: f64 = 5.0;

    /// Margin by which a channel must lead to call a reference color dominant
    pub const FIT_DOMINANCE_MARGIN: f64 = 30.0;

    /// Average deviation magnitude bands for the quality verdict
    pub const QUALITY_EXCELLENT: f64 = 5.0;
    pub const QUALITY_GOOD: f64 = 10.0;
    pub const QUALITY_FAIR: f64 = 20.0;

    /// Per-channel standard deviation bands for the consistency verdict
    pub const CONSISTENT_STD: f64 = 5.0;
    pub const MODERATE_STD: f64 = 10.0;

    /// Recommendation triggers on average channel deviation
    pub const RED_RECOMMENDATION: f64 = 3.0;
    pub const GREEN_RECOMMENDATION: f64 = 5.0;
    pub const BLUE_RECOMMENDATION: f64 = 5.0;

    pub const METHOD_DEVIATION: &str = "average_deviation_calibration";
    pub const METHOD_WEIGHTED: &str = "weighted_reference_calibration";
    pub const METHOD_PER_COLOR: &str = "enhanced_per_color_correction";
}

/// Default correction profiles.
///
/// These were fit against one screenshot pipeline. They are a starting
/// profile for uncalibrated sessions, not physical constants; every
/// deployment is expected to recalibrate.
pub mod profile {
    /// Universal per-channel offsets (red, green, blue)
    pub const UNIVERSAL: [f64; 3] = [-8.0, -6.0, -10.0];

    /// Margin by which a channel must lead for per-dominant correction
    pub const DOMINANCE_MARGIN: f64 = 50.0;

    /// Offsets for red-dominant input
    pub const RED_DOMINANT: [f64; 3] = [-1.0, 0.0, 0.0];
    /// Offsets for green-dominant input (blue contamination)
    pub const GREEN_DOMINANT: [f64; 3] = [0.0, 0.0, -37.0];
    /// Offsets for blue-dominant input (red/green contamination)
    pub const BLUE_DOMINANT: [f64; 3] = [-26.0, -17.0, 0.0];

    /// Calibration files searched for, most specific first
    pub const CALIBRATION_FILES: [&str; 2] = ["calibration_enhanced.json", "calibration.json"];
}

/// Reference library lookup defaults
pub mod library {
    pub const MAX_DELTA_E: f64 = 5.0;
    pub const MAX_RESULTS: usize = 3;
}
