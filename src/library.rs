//! Reference color library
//!
//! Named reference colors used as calibration targets and as the
//! comparison set for closest-match lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::color::{delta_e_cie2000, ColorSpaceConverter, LabColor, RgbColor};
use crate::constants::delta_e::{MATCH_EXCELLENT, MATCH_FAIR, MATCH_GOOD};
use crate::{ColorError, Result};

/// Role of a reference color in the weighted calibration fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColorCategory {
    Primary,
    Secondary,
    Neutral,
}

impl fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorCategory::Primary => "Primary",
            ColorCategory::Secondary => "Secondary",
            ColorCategory::Neutral => "Neutral",
        };
        f.write_str(name)
    }
}

/// A named color with known values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceColor {
    pub name: String,
    pub expected_rgb: RgbColor,
    pub expected_lab: LabColor,
    pub category: ColorCategory,
}

impl ReferenceColor {
    pub fn new(
        name: impl Into<String>,
        expected_rgb: RgbColor,
        expected_lab: LabColor,
        category: ColorCategory,
    ) -> Self {
        Self {
            name: name.into(),
            expected_rgb,
            expected_lab,
            category,
        }
    }

    /// Build a reference whose Lab value is derived from its RGB value
    pub fn from_rgb(
        name: impl Into<String>,
        expected_rgb: RgbColor,
        category: ColorCategory,
        converter: &ColorSpaceConverter,
    ) -> Result<Self> {
        expected_rgb.validate()?;
        Ok(Self::new(
            name,
            expected_rgb,
            converter.rgb_to_lab(expected_rgb),
            category,
        ))
    }
}

/// How close a library match is, by ΔE00
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MatchQuality {
    pub fn from_delta_e(delta_e: f64) -> Self {
        if delta_e <= MATCH_EXCELLENT {
            MatchQuality::Excellent
        } else if delta_e <= MATCH_GOOD {
            MatchQuality::Good
        } else if delta_e <= MATCH_FAIR {
            MatchQuality::Fair
        } else {
            MatchQuality::Poor
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchQuality::Excellent => "Excellent",
            MatchQuality::Good => "Good",
            MatchQuality::Fair => "Fair",
            MatchQuality::Poor => "Poor",
        };
        f.write_str(name)
    }
}

/// One closest-match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorMatch {
    pub reference: ReferenceColor,
    pub delta_e: f64,
    pub quality: MatchQuality,
}

/// Read-only collection of reference colors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub name: String,
    colors: Vec<ReferenceColor>,
}

impl Default for ReferenceLibrary {
    fn default() -> Self {
        Self::basic()
    }
}

impl ReferenceLibrary {
    pub fn new(name: impl Into<String>, colors: Vec<ReferenceColor>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Six-color library used when no library file is supplied
    pub fn basic() -> Self {
        let color = |name: &str, rgb: [u8; 3], lab: [f64; 3], category| {
            ReferenceColor::new(name, RgbColor::from(rgb), LabColor::from(lab), category)
        };
        Self::new(
            "basic",
            vec![
                color("Pure Red", [255, 0, 0], [53.0, 80.0, 67.0], ColorCategory::Primary),
                color("Pure Green", [0, 255, 0], [87.0, -86.0, 83.0], ColorCategory::Primary),
                color("Pure Blue", [0, 0, 255], [32.0, 79.0, -108.0], ColorCategory::Primary),
                color("White", [255, 255, 255], [100.0, 0.0, 0.0], ColorCategory::Neutral),
                color("Black", [0, 0, 0], [0.0, 0.0, 0.0], ColorCategory::Neutral),
                color("Gray 50%", [128, 128, 128], [54.0, 0.0, 0.0], ColorCategory::Neutral),
            ],
        )
    }

    /// Load a library from JSON (`{"name": ..., "colors": [...]}`)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ColorError::io(path, e))?;
        let library: Self =
            serde_json::from_str(&content).map_err(|e| ColorError::serialization(path, e))?;
        for color in &library.colors {
            color.expected_rgb.validate()?;
        }
        log::debug!(
            "loaded library '{}' with {} colors from {}",
            library.name,
            library.colors.len(),
            path.display()
        );
        Ok(library)
    }

    pub fn colors(&self) -> &[ReferenceColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Look a color up by name.
    ///
    /// Case-insensitive exact match first, then the first color whose
    /// name contains `name` or is contained in it.
    pub fn find(&self, name: &str) -> Option<&ReferenceColor> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.colors
            .iter()
            .find(|color| color.name.to_lowercase() == wanted)
            .or_else(|| {
                self.colors.iter().find(|color| {
                    let candidate = color.name.to_lowercase();
                    candidate.contains(&wanted) || wanted.contains(&candidate)
                })
            })
    }

    /// Library colors within `max_delta_e` of `lab`, best first
    pub fn find_closest_matches(
        &self,
        lab: LabColor,
        max_delta_e: f64,
        max_results: usize,
    ) -> Vec<ColorMatch> {
        let mut matches: Vec<ColorMatch> = self
            .colors
            .iter()
            .filter_map(|reference| {
                let delta_e = delta_e_cie2000(lab, reference.expected_lab);
                (delta_e <= max_delta_e).then(|| ColorMatch {
                    reference: reference.clone(),
                    delta_e,
                    quality: MatchQuality::from_delta_e(delta_e),
                })
            })
            .collect();
        matches.sort_by(|a, b| a.delta_e.total_cmp(&b.delta_e));
        matches.truncate(max_results);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basic_library() {
        let library = ReferenceLibrary::basic();
        assert_eq!(library.len(), 6);
        let primaries = library
            .colors()
            .iter()
            .filter(|c| c.category == ColorCategory::Primary)
            .count();
        assert_eq!(primaries, 3);
    }

    #[test]
    fn test_fuzzy_lookup() {
        let library = ReferenceLibrary::basic();
        assert_eq!(library.find("White").unwrap().name, "White");
        assert_eq!(library.find("pure red").unwrap().name, "Pure Red");
        assert_eq!(library.find("green").unwrap().name, "Pure Green");
        assert_eq!(library.find("Gray 50% swatch").unwrap().name, "Gray 50%");
        assert!(library.find("teal").is_none());
        assert!(library.find("  ").is_none());
    }

    #[test]
    fn test_closest_matches_sorted_and_limited() {
        let converter = ColorSpaceConverter::new();
        let library = ReferenceLibrary::new(
            "reds",
            [(250, 0, 0), (255, 0, 0), (240, 10, 10), (0, 0, 255)]
                .iter()
                .enumerate()
                .map(|(i, &(r, g, b))| {
                    ReferenceColor::from_rgb(
                        format!("c{}", i),
                        RgbColor::from_u8(r, g, b),
                        ColorCategory::Primary,
                        &converter,
                    )
                    .unwrap()
                })
                .collect(),
        );

        let sample = converter.rgb_to_lab(RgbColor::new(255.0, 0.0, 0.0));
        let matches = library.find_closest_matches(sample, 5.0, 2);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].reference.name, "c1");
        assert_eq!(matches[0].quality, MatchQuality::Excellent);
        assert!(matches[0].delta_e <= matches[1].delta_e);
        assert!(matches.iter().all(|m| m.reference.name != "c3"));
    }

    #[test]
    fn test_match_quality_bands() {
        assert_eq!(MatchQuality::from_delta_e(0.5), MatchQuality::Excellent);
        assert_eq!(MatchQuality::from_delta_e(2.5), MatchQuality::Good);
        assert_eq!(MatchQuality::from_delta_e(4.0), MatchQuality::Fair);
        assert_eq!(MatchQuality::from_delta_e(7.0), MatchQuality::Poor);
    }

    #[test]
    fn test_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(
            &path,
            r#"{"name": "inks", "colors": [
                {"name": "Prussian Blue", "expected_rgb": [0, 49, 83],
                 "expected_lab": [20.2, -2.1, -24.6], "category": "Secondary"}
            ]}"#,
        )
        .unwrap();

        let library = ReferenceLibrary::from_json_file(&path).unwrap();
        assert_eq!(library.name, "inks");
        assert_eq!(library.find("prussian").unwrap().category, ColorCategory::Secondary);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ReferenceLibrary::from_json_file(&path),
            Err(ColorError::Serialization { .. })
        ));
    }
}
