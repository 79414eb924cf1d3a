//! Color space conversion utilities
//!
//! Two interchangeable RGB -> CIELab strategies:
//! - `Precise`: standards-based sRGB -> CIELab (D65) through `palette`
//! - `Approximation`: the closed-form sRGB decode, sRGB -> XYZ matrix and
//!   CIE 1976 nonlinearity, always available
//!
//! The strategy is chosen once, when the converter is built, and never
//! re-probed per call.

use serde::{Deserialize, Serialize};

use super::model::{LabColor, RgbColor};
use crate::constants::{cie, d65, srgb, CHANNEL_MAX, SRGB_TO_XYZ, XYZ_TO_SRGB};

/// RGB -> Lab conversion strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMethod {
    /// Colorimetric library conversion (requires the `precise` feature)
    Precise,
    /// Built-in closed-form approximation
    Approximation,
}

impl ConversionMethod {
    /// Best strategy compiled into this build
    pub fn available() -> Self {
        if cfg!(feature = "precise") {
            ConversionMethod::Precise
        } else {
            ConversionMethod::Approximation
        }
    }

    /// Downgrade `Precise` when the colorimetric backend is not compiled in
    pub fn resolve(self) -> Self {
        match self {
            ConversionMethod::Precise if !cfg!(feature = "precise") => {
                log::warn!("precise conversion not compiled in, using approximation");
                ConversionMethod::Approximation
            }
            method => method,
        }
    }
}

impl Default for ConversionMethod {
    fn default() -> Self {
        Self::available()
    }
}

/// Stateless color converter bound to one conversion strategy
#[derive(Debug, Clone, Copy)]
pub struct ColorSpaceConverter {
    method: ConversionMethod,
}

impl Default for ColorSpaceConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorSpaceConverter {
    /// Create a converter using the best available strategy
    pub fn new() -> Self {
        Self::with_method(ConversionMethod::available())
    }

    /// Create a converter with an explicit strategy
    pub fn with_method(method: ConversionMethod) -> Self {
        Self {
            method: method.resolve(),
        }
    }

    pub fn method(&self) -> ConversionMethod {
        self.method
    }

    /// Convert RGB (0-255) to CIELab, D65. L* is clamped to [0, 100].
    pub fn rgb_to_lab(&self, rgb: RgbColor) -> LabColor {
        let lab = match self.method {
            ConversionMethod::Precise => precise::rgb_to_lab(rgb),
            ConversionMethod::Approximation => approximate_rgb_to_lab(rgb),
        };
        LabColor::new(lab.l.clamp(0.0, 100.0), lab.a, lab.b)
    }

    /// Convert CIELab (D65) back to RGB on the 0-255 scale, clamped to gamut
    pub fn lab_to_rgb(&self, lab: LabColor) -> RgbColor {
        let rgb = match self.method {
            ConversionMethod::Precise => precise::lab_to_rgb(lab),
            ConversionMethod::Approximation => approximate_lab_to_rgb(lab),
        };
        rgb.clamped()
    }
}

/// sRGB transfer function, encoded [0,1] -> linear
fn decode_gamma(c: f64) -> f64 {
    if c <= srgb::DECODE_THRESHOLD {
        c / srgb::LINEAR_SCALE
    } else {
        ((c + srgb::ALPHA) / (1.0 + srgb::ALPHA)).powf(srgb::GAMMA)
    }
}

/// sRGB transfer function, linear -> encoded [0,1]
fn encode_gamma(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    if c <= srgb::ENCODE_THRESHOLD {
        srgb::LINEAR_SCALE * c
    } else {
        (1.0 + srgb::ALPHA) * c.powf(1.0 / srgb::GAMMA) - srgb::ALPHA
    }
}

fn lab_f(t: f64) -> f64 {
    if t > cie::EPSILON {
        t.cbrt()
    } else {
        cie::LINEAR_SLOPE * t + cie::LINEAR_OFFSET
    }
}

fn lab_f_inv(t: f64) -> f64 {
    let cubed = t * t * t;
    if cubed > cie::EPSILON {
        cubed
    } else {
        (t - cie::LINEAR_OFFSET) / cie::LINEAR_SLOPE
    }
}

fn mat_mul(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Closed-form sRGB -> CIELab (D65), no clamping of L*
pub fn approximate_rgb_to_lab(rgb: RgbColor) -> LabColor {
    let linear = rgb.channels().map(|c| decode_gamma(c / CHANNEL_MAX));
    let xyz = mat_mul(&SRGB_TO_XYZ, linear);

    let [xn, yn, zn] = d65::WHITE_POINT_XYZ;
    let fx = lab_f(xyz[0] / xn);
    let fy = lab_f(xyz[1] / yn);
    let fz = lab_f(xyz[2] / zn);

    LabColor::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// Closed-form CIELab (D65) -> sRGB on the 0-255 scale, unclamped
pub fn approximate_lab_to_rgb(lab: LabColor) -> RgbColor {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;

    let [xn, yn, zn] = d65::WHITE_POINT_XYZ;
    let xyz = [lab_f_inv(fx) * xn, lab_f_inv(fy) * yn, lab_f_inv(fz) * zn];
    let [r, g, b] = mat_mul(&XYZ_TO_SRGB, xyz).map(|c| encode_gamma(c) * CHANNEL_MAX);
    RgbColor::new(r, g, b)
}

#[cfg(feature = "precise")]
mod precise {
    use palette::{white_point::D65, FromColor, Lab, Srgb};

    use crate::color::model::{LabColor, RgbColor};
    use crate::constants::CHANNEL_MAX;

    pub fn rgb_to_lab(rgb: RgbColor) -> LabColor {
        let srgb = Srgb::<f64>::new(rgb.r / CHANNEL_MAX, rgb.g / CHANNEL_MAX, rgb.b / CHANNEL_MAX);
        let lab: Lab<D65, f64> = Lab::from_color(srgb);
        LabColor::new(lab.l, lab.a, lab.b)
    }

    pub fn lab_to_rgb(lab: LabColor) -> RgbColor {
        let srgb = Srgb::<f64>::from_color(Lab::<D65, f64>::new(lab.l, lab.a, lab.b));
        RgbColor::new(
            srgb.red * CHANNEL_MAX,
            srgb.green * CHANNEL_MAX,
            srgb.blue * CHANNEL_MAX,
        )
    }
}

#[cfg(not(feature = "precise"))]
mod precise {
    use crate::color::model::{LabColor, RgbColor};

    pub fn rgb_to_lab(rgb: RgbColor) -> LabColor {
        super::approximate_rgb_to_lab(rgb)
    }

    pub fn lab_to_rgb(lab: LabColor) -> RgbColor {
        super::approximate_lab_to_rgb(lab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<RgbColor> {
        vec![
            RgbColor::new(255.0, 0.0, 0.0),
            RgbColor::new(0.0, 255.0, 0.0),
            RgbColor::new(0.0, 0.0, 255.0),
            RgbColor::new(255.0, 255.0, 255.0),
            RgbColor::new(0.0, 0.0, 0.0),
            RgbColor::new(128.0, 128.0, 128.0),
        ]
    }

    #[test]
    fn test_rgb_to_lab_black() {
        let converter = ColorSpaceConverter::with_method(ConversionMethod::Approximation);
        let lab = converter.rgb_to_lab(RgbColor::BLACK);
        assert!(lab.l.abs() < 1e-9);
        assert!(lab.a.abs() < 1e-9);
        assert!(lab.b.abs() < 1e-9);
    }

    #[test]
    fn test_rgb_to_lab_white() {
        let converter = ColorSpaceConverter::with_method(ConversionMethod::Approximation);
        let lab = converter.rgb_to_lab(RgbColor::WHITE);
        assert!((lab.l - 100.0).abs() < 0.01);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
    }

    #[test]
    fn test_known_primaries() {
        let converter = ColorSpaceConverter::with_method(ConversionMethod::Approximation);
        let red = converter.rgb_to_lab(RgbColor::new(255.0, 0.0, 0.0));
        assert!((red.l - 53.24).abs() < 0.05);
        assert!((red.a - 80.09).abs() < 0.05);
        assert!((red.b - 67.20).abs() < 0.05);

        let blue = converter.rgb_to_lab(RgbColor::new(0.0, 0.0, 255.0));
        assert!((blue.l - 32.30).abs() < 0.05);
        assert!((blue.b + 107.86).abs() < 0.05);
    }

    #[test]
    fn test_gray_lightness_band() {
        let converter = ColorSpaceConverter::new();
        let gray = converter.rgb_to_lab(RgbColor::new(128.0, 128.0, 128.0));
        assert!(gray.l > 50.0 && gray.l < 55.0);
        assert!(gray.a.abs() < 0.5 && gray.b.abs() < 0.5);
    }

    #[test]
    fn test_conversion_paths_agree() {
        let precise = ColorSpaceConverter::with_method(ConversionMethod::Precise);
        let approx = ColorSpaceConverter::with_method(ConversionMethod::Approximation);

        for rgb in palette() {
            let p = precise.rgb_to_lab(rgb);
            let a = approx.rgb_to_lab(rgb);
            assert!((p.l - a.l).abs() < 1.0, "L* differs for {}", rgb);
            assert!((p.a - a.a).abs() < 1.0, "a* differs for {}", rgb);
            assert!((p.b - a.b).abs() < 1.0, "b* differs for {}", rgb);
        }
    }

    #[test]
    fn test_lab_to_rgb_round_trip() {
        let converter = ColorSpaceConverter::with_method(ConversionMethod::Approximation);
        for rgb in palette() {
            let back = converter.lab_to_rgb(converter.rgb_to_lab(rgb));
            for (x, y) in back.channels().iter().zip(rgb.channels()) {
                assert!((x - y).abs() < 0.5, "{} came back as {}", rgb, back);
            }
        }
    }

    #[test]
    fn test_lab_to_rgb_clamps_out_of_gamut() {
        let converter = ColorSpaceConverter::new();
        let rgb = converter.lab_to_rgb(LabColor::new(50.0, 120.0, 120.0));
        for c in rgb.channels() {
            assert!((0.0..=255.0).contains(&c));
        }
    }

    #[test]
    fn test_lightness_is_clamped() {
        let converter = ColorSpaceConverter::with_method(ConversionMethod::Approximation);
        let lab = converter.rgb_to_lab(RgbColor::new(300.0, 300.0, 300.0));
        assert_eq!(lab.l, 100.0);
    }
}
