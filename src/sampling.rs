//! Sampling colors from image regions
//!
//! Regions are placed in Cartesian coordinates (origin at the bottom-left
//! of the image) and converted to pixel rows here. The region mean keeps
//! decimal precision.

use image::{ImageFormat, ImageReader, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::RgbColor;
use crate::correction::{correct_batch, CalibrationContext, Corrected, CorrectionStrategy};
use crate::{ColorError, Result};

/// Outline of a sample region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleShape {
    Rectangle,
    /// Inscribed in the region's bounding box
    #[default]
    Circle,
}

/// Which point of the region sits at `(x, y)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A sample region on an image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRegion {
    pub x: f64,
    pub y: f64,
    pub shape: SampleShape,
    /// Width and height; a circle uses the smaller as its diameter
    pub size: (f64, f64),
    #[serde(default)]
    pub anchor: Anchor,
}

/// Pixel rectangle in image coordinates, right and bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelBounds {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Mean color of one region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSample {
    pub rgb: RgbColor,
    pub pixel_count: usize,
}

impl SampleRegion {
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            shape: SampleShape::Rectangle,
            size: (width, height),
            anchor: Anchor::Center,
        }
    }

    pub fn circle(x: f64, y: f64, diameter: f64) -> Self {
        Self {
            x,
            y,
            shape: SampleShape::Circle,
            size: (diameter, diameter),
            anchor: Anchor::Center,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    fn validate(&self) -> Result<()> {
        let (width, height) = self.size;
        for (parameter, value) in [("x", self.x), ("y", self.y)] {
            if !value.is_finite() {
                return Err(ColorError::invalid_parameter(parameter, value));
            }
        }
        for (parameter, value) in [("width", width), ("height", height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ColorError::invalid_parameter(parameter, value));
            }
        }
        Ok(())
    }

    /// Pixel bounds on a `width` x `height` image, clamped to the image.
    ///
    /// `None` when the region lies entirely outside.
    pub fn bounds(&self, width: u32, height: u32) -> Option<PixelBounds> {
        let (w, h) = self.size;
        // Image rows grow downward
        let row = f64::from(height) - self.y;
        let (left, top) = match self.anchor {
            Anchor::Center => (self.x - w / 2.0, row - h / 2.0),
            Anchor::TopLeft => (self.x, row),
            Anchor::TopRight => (self.x - w, row),
            Anchor::BottomLeft => (self.x, row - h),
            Anchor::BottomRight => (self.x - w, row - h),
        };

        let clamp = |v: f64, max: u32| v.floor().clamp(0.0, f64::from(max)) as u32;
        let bounds = PixelBounds {
            left: clamp(left, width),
            top: clamp(top, height),
            right: clamp(left + w, width),
            bottom: clamp(top + h, height),
        };
        (bounds.left < bounds.right && bounds.top < bounds.bottom).then_some(bounds)
    }

    fn includes(&self, bounds: &PixelBounds, px: u32, py: u32) -> bool {
        match self.shape {
            SampleShape::Rectangle => true,
            SampleShape::Circle => {
                let cx = f64::from(bounds.left + bounds.right) / 2.0;
                let cy = f64::from(bounds.top + bounds.bottom) / 2.0;
                let radius = f64::from(bounds.width().min(bounds.height())) / 2.0;
                let dx = f64::from(px) + 0.5 - cx;
                let dy = f64::from(py) + 0.5 - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }

    /// Mean RGB over the region, skipping fully transparent pixels
    pub fn sample(&self, image: &RgbaImage) -> Result<RegionSample> {
        self.validate()?;
        let bounds = self
            .bounds(image.width(), image.height())
            .ok_or_else(|| ColorError::invalid_parameter("region", format!("{:?} outside image", self)))?;

        let mut sum = [0.0; 3];
        let mut pixel_count = 0usize;
        for py in bounds.top..bounds.bottom {
            for px in bounds.left..bounds.right {
                if !self.includes(&bounds, px, py) {
                    continue;
                }
                let [r, g, b, a] = image.get_pixel(px, py).0;
                if a == 0 {
                    continue;
                }
                sum[0] += f64::from(r);
                sum[1] += f64::from(g);
                sum[2] += f64::from(b);
                pixel_count += 1;
            }
        }

        if pixel_count == 0 {
            return Err(ColorError::NoSamples);
        }
        let n = pixel_count as f64;
        log::debug!(
            "sampled {} pixels in ({}, {})-({}, {})",
            pixel_count,
            bounds.left,
            bounds.top,
            bounds.right,
            bounds.bottom
        );
        Ok(RegionSample {
            rgb: RgbColor::new(sum[0] / n, sum[1] / n, sum[2] / n),
            pixel_count,
        })
    }
}

/// Sample every region, in order
pub fn sample_regions(image: &RgbaImage, regions: &[SampleRegion]) -> Result<Vec<RegionSample>> {
    regions.iter().map(|region| region.sample(image)).collect()
}

/// Sample every region and correct the unrounded means
pub fn sample_corrected(
    image: &RgbaImage,
    regions: &[SampleRegion],
    strategy: CorrectionStrategy,
    context: &CalibrationContext,
) -> Result<Vec<(RegionSample, Corrected)>> {
    let samples = sample_regions(image, regions)?;
    let raw: Vec<RgbColor> = samples.iter().map(|s| s.rgb).collect();
    let corrected = correct_batch(&raw, strategy, context)?;
    Ok(samples.into_iter().zip(corrected).collect())
}

/// Check whether an extension names a supported image format
pub fn is_supported_extension(ext: &str) -> bool {
    ImageFormat::from_extension(ext).is_some_and(|format| format.reading_enabled())
}

/// Load an image from disk as 8-bit RGBA
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        ColorError::image_load(format!("Unknown image format: {}", path.display()), e)
    })?;

    let mut reader = ImageReader::open(path).map_err(|e| {
        ColorError::image_load(format!("Failed to open image file: {}", path.display()), e)
    })?;
    reader.set_format(format);

    let image = reader.decode().map_err(|e| {
        ColorError::image_load(format!("Failed to decode image: {}", path.display()), e)
    })?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationMatrix, ChannelCorrection};
    use image::Rgba;
    use tempfile::TempDir;

    /// 100x80 image: left half red, right half blue
    fn split_image() -> RgbaImage {
        RgbaImage::from_fn(100, 80, |x, _| {
            if x < 50 {
                Rgba([200, 40, 40, 255])
            } else {
                Rgba([30, 30, 220, 255])
            }
        })
    }

    #[test]
    fn test_center_bounds_flip_vertical_axis() {
        let region = SampleRegion::rectangle(50.0, 60.0, 10.0, 10.0);
        let bounds = region.bounds(100, 80).unwrap();
        assert_eq!(
            bounds,
            PixelBounds {
                left: 45,
                top: 15,
                right: 55,
                bottom: 25
            }
        );
    }

    #[test]
    fn test_anchor_corners() {
        let b = |anchor| {
            SampleRegion::rectangle(20.0, 40.0, 10.0, 6.0)
                .with_anchor(anchor)
                .bounds(100, 80)
                .unwrap()
        };
        assert_eq!((b(Anchor::TopLeft).left, b(Anchor::TopLeft).top), (20, 40));
        assert_eq!((b(Anchor::TopRight).right, b(Anchor::TopRight).top), (20, 40));
        assert_eq!((b(Anchor::BottomLeft).left, b(Anchor::BottomLeft).bottom), (20, 40));
        assert_eq!(
            (b(Anchor::BottomRight).right, b(Anchor::BottomRight).bottom),
            (20, 40)
        );
    }

    #[test]
    fn test_bounds_are_clamped() {
        let region = SampleRegion::rectangle(2.0, 2.0, 10.0, 10.0);
        let bounds = region.bounds(100, 80).unwrap();
        assert_eq!((bounds.left, bounds.bottom), (0, 80));
        assert!(SampleRegion::rectangle(500.0, 40.0, 10.0, 10.0).bounds(100, 80).is_none());
    }

    #[test]
    fn test_sample_uniform_area() {
        let sample = SampleRegion::circle(25.0, 40.0, 10.0).sample(&split_image()).unwrap();
        assert_eq!(sample.rgb, RgbColor::new(200.0, 40.0, 40.0));
        assert!(sample.pixel_count > 50 && sample.pixel_count < 100);
    }

    #[test]
    fn test_sample_keeps_decimal_precision() {
        // Straddles the red/blue boundary: 5 columns of each
        let sample = SampleRegion::rectangle(50.0, 40.0, 10.0, 4.0)
            .sample(&split_image())
            .unwrap();
        assert_eq!(sample.pixel_count, 40);
        assert_eq!(sample.rgb, RgbColor::new(115.0, 35.0, 130.0));
    }

    #[test]
    fn test_transparent_pixels_are_skipped() {
        let mut image = split_image();
        for y in 0..80 {
            image.put_pixel(10, y, Rgba([0, 0, 0, 0]));
        }
        let sample = SampleRegion::rectangle(10.5, 40.0, 3.0, 2.0)
            .sample(&image)
            .unwrap();
        assert_eq!(sample.pixel_count, 4);
        assert_eq!(sample.rgb, RgbColor::new(200.0, 40.0, 40.0));

        let hole = SampleRegion::rectangle(10.5, 40.0, 1.0, 2.0).sample(&image);
        assert!(matches!(hole, Err(ColorError::NoSamples)));
    }

    #[test]
    fn test_correction_sees_unrounded_mean() {
        let image = RgbaImage::from_fn(100, 80, |x, _| {
            if x < 50 {
                Rgba([100, 100, 100, 255])
            } else {
                Rgba([101, 101, 101, 255])
            }
        });
        let context = CalibrationContext::with_matrix(
            Default::default(),
            "test",
            CalibrationMatrix::additive(ChannelCorrection::new(0.3, 0.3, 0.3)),
        );
        // Three columns of 100, two of 101
        let region = SampleRegion::rectangle(50.0, 40.0, 5.0, 2.0);

        let out = sample_corrected(&image, &[region], CorrectionStrategy::Dynamic, &context).unwrap();
        let (sample, corrected) = &out[0];
        assert_eq!(sample.pixel_count, 10);
        assert!((sample.rgb.r - 100.4).abs() < 1e-9);
        assert_eq!(corrected.raw, sample.rgb);
        assert_eq!(corrected.rgb, RgbColor::new(101.0, 101.0, 101.0));
    }

    #[test]
    fn test_invalid_region_is_rejected() {
        let region = SampleRegion::rectangle(10.0, 10.0, 0.0, 5.0);
        assert!(region.sample(&split_image()).is_err());
    }

    #[test]
    fn test_load_image_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("swatch.png");
        split_image().save(&path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (100, 80));
        assert_eq!(loaded.get_pixel(75, 10).0, [30, 30, 220, 255]);

        assert!(load_image(&dir.path().join("swatch.unknown")).is_err());
        assert!(is_supported_extension("PNG"));
        assert!(!is_supported_extension("heic"));
    }
}
