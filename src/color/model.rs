//! Color value types
//!
//! `RgbColor` keeps decimal precision through averaging and correction;
//! values are only rounded and clamped by [`RgbColor::to_display`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::CHANNEL_MAX;
use crate::{ColorError, Result};

/// An sRGB color with channels on the 0-255 scale.
///
/// Serialized as a `[r, g, b]` array, the shape used by calibration files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0.0, 0.0, 0.0);
    pub const WHITE: RgbColor = RgbColor::new(255.0, 255.0, 255.0);

    /// Construct without validation (intermediate values may leave 0-255)
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Construct from 8-bit channels
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(f64::from(r), f64::from(g), f64::from(b))
    }

    /// Construct a boundary value, rejecting non-finite or out-of-range channels
    pub fn try_new(r: f64, g: f64, b: f64) -> Result<Self> {
        let color = Self::new(r, g, b);
        color.validate()?;
        Ok(color)
    }

    /// Check every channel is finite and within 0-255
    pub fn validate(&self) -> Result<()> {
        for (channel, value) in self.named_channels() {
            if !value.is_finite() || !(0.0..=CHANNEL_MAX).contains(&value) {
                return Err(ColorError::InvalidChannel { channel, value });
            }
        }
        Ok(())
    }

    /// Check every channel is finite (range is not enforced)
    pub fn validate_finite(&self) -> Result<()> {
        for (channel, value) in self.named_channels() {
            if !value.is_finite() {
                return Err(ColorError::InvalidChannel { channel, value });
            }
        }
        Ok(())
    }

    fn named_channels(&self) -> [(&'static str, f64); 3] {
        [("red", self.r), ("green", self.g), ("blue", self.b)]
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Channels clamped to 0-255, unrounded
    pub fn clamped(&self) -> Self {
        let clamp = |c: f64| c.clamp(0.0, CHANNEL_MAX);
        Self::new(clamp(self.r), clamp(self.g), clamp(self.b))
    }

    /// Clamp and round for display or storage
    pub fn to_display(&self) -> Self {
        let c = self.clamped();
        Self::new(c.r.round(), c.g.round(), c.b.round())
    }

    /// Clamp and round to 8-bit channels
    pub fn to_u8(&self) -> [u8; 3] {
        let c = self.to_display();
        [c.r as u8, c.g as u8, c.b as u8]
    }

    /// Signed per-channel difference `self - other`
    pub fn difference(&self, other: &RgbColor) -> [f64; 3] {
        [self.r - other.r, self.g - other.g, self.b - other.b]
    }

    /// Hexadecimal representation (e.g., "#FF0000")
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.to_u8();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Parse "#RRGGBB" or "RRGGBB"
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorError::invalid_parameter("hex", hex));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorError::invalid_parameter("hex", hex))
        };
        Ok(Self::from_u8(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl From<[f64; 3]> for RgbColor {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<RgbColor> for [f64; 3] {
    fn from(color: RgbColor) -> Self {
        color.channels()
    }
}

impl From<[u8; 3]> for RgbColor {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::from_u8(r, g, b)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "({:.p$}, {:.p$}, {:.p$})", self.r, self.g, self.b, p = p),
            None => write!(f, "({}, {}, {})", self.r, self.g, self.b),
        }
    }
}

/// CIE L*a*b* coordinates (D65)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct LabColor {
    /// Lightness, 0-100
    pub l: f64,
    /// Green (-) to red (+)
    pub a: f64,
    /// Blue (-) to yellow (+)
    pub b: f64,
}

impl LabColor {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Chroma `sqrt(a² + b²)`
    pub fn chroma(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Component-wise mean; `None` for an empty slice
    pub fn mean(values: &[LabColor]) -> Option<LabColor> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let (l, a, b) = values
            .iter()
            .fold((0.0, 0.0, 0.0), |(l, a, b), lab| (l + lab.l, a + lab.a, b + lab.b));
        Some(LabColor::new(l / n, a / n, b / n))
    }
}

impl From<[f64; 3]> for LabColor {
    fn from([l, a, b]: [f64; 3]) -> Self {
        Self::new(l, a, b)
    }
}

impl From<LabColor> for [f64; 3] {
    fn from(color: LabColor) -> Self {
        [color.l, color.a, color.b]
    }
}

impl fmt::Display for LabColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = f.precision().unwrap_or(2);
        write!(f, "L*{:.p$} a*{:.p$} b*{:.p$}", self.l, self.a, self.b, p = p)
    }
}

/// Component-wise mean of RGB values; `None` for an empty slice
pub(crate) fn mean_rgb(values: &[RgbColor]) -> Option<RgbColor> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let (r, g, b) = values
        .iter()
        .fold((0.0, 0.0, 0.0), |(r, g, b), c| (r + c.r, g + c.g, b + c.b));
    Some(RgbColor::new(r / n, g / n, b / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert!(RgbColor::try_new(0.0, 128.5, 255.0).is_ok());
        assert!(matches!(
            RgbColor::try_new(256.0, 0.0, 0.0),
            Err(ColorError::InvalidChannel { channel: "red", .. })
        ));
        assert!(RgbColor::try_new(0.0, f64::NAN, 0.0).is_err());
        assert!(RgbColor::try_new(0.0, 0.0, -1.0).is_err());
    }

    #[test]
    fn test_to_display_clamps_and_rounds() {
        let color = RgbColor::new(-3.2, 127.5, 300.0);
        assert_eq!(color.to_display(), RgbColor::new(0.0, 128.0, 255.0));
        assert_eq!(color.to_u8(), [0, 128, 255]);
    }

    #[test]
    fn test_hex_round_trip() {
        let color = RgbColor::from_u8(51, 102, 204);
        assert_eq!(color.to_hex(), "#3366CC");
        assert_eq!(RgbColor::from_hex("#3366CC").unwrap(), color);
        assert_eq!(RgbColor::from_hex("3366cc").unwrap(), color);
        assert!(RgbColor::from_hex("#FF").is_err());
        assert!(RgbColor::from_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&RgbColor::new(254.0, 1.0, 0.0)).unwrap();
        assert_eq!(json, "[254.0,1.0,0.0]");
        let back: RgbColor = serde_json::from_str("[0, 241, 0]").unwrap();
        assert_eq!(back, RgbColor::new(0.0, 241.0, 0.0));
    }

    #[test]
    fn test_lab_mean_and_chroma() {
        let mean = LabColor::mean(&[LabColor::new(40.0, 10.0, 0.0), LabColor::new(60.0, -10.0, 6.0)])
            .unwrap();
        assert_eq!(mean, LabColor::new(50.0, 0.0, 3.0));
        assert!((LabColor::new(50.0, 3.0, 4.0).chroma() - 5.0).abs() < 1e-12);
        assert!(LabColor::mean(&[]).is_none());
    }
}
