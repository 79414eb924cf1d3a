//! Persisted calibration record
//!
//! ```json
//! {
//!   "calibration_matrix": {
//!     "method": "weighted_reference_calibration",
//!     "created_date": "2025-01-01T12:00:00+00:00",
//!     "corrections": { "red_correction": -1.0, "green_correction": 2.5, "blue_correction": 0.0 }
//!   },
//!   "wizard_data": { "measured_colors": { "red": [254, 1, 0] }, "reference_image": "target.png" }
//! }
//! ```
//!
//! Saves replace the file atomically; a failed save leaves the previous
//! record untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use super::matrix::CalibrationMatrix;
use crate::color::RgbColor;
use crate::{ColorError, Result};

/// Top-level calibration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub calibration_matrix: CalibrationRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wizard_data: Option<WizardData>,
}

/// Matrix plus provenance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationRecord {
    pub method: String,
    /// ISO-8601 timestamp, kept verbatim
    pub created_date: String,
    pub corrections: CalibrationMatrix,
}

/// Inputs captured by the calibration wizard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardData {
    pub measured_colors: BTreeMap<String, RgbColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
}

impl CalibrationFile {
    /// New record stamped with the current time
    pub fn new(method: impl Into<String>, matrix: CalibrationMatrix) -> Self {
        Self {
            calibration_matrix: CalibrationRecord {
                method: method.into(),
                created_date: chrono::Utc::now().to_rfc3339(),
                corrections: matrix,
            },
            wizard_data: None,
        }
    }

    pub fn with_wizard_data(mut self, wizard_data: WizardData) -> Self {
        self.wizard_data = Some(wizard_data);
        self
    }

    pub fn method(&self) -> &str {
        &self.calibration_matrix.method
    }

    pub fn matrix(&self) -> &CalibrationMatrix {
        &self.calibration_matrix.corrections
    }

    pub fn into_matrix(self) -> CalibrationMatrix {
        self.calibration_matrix.corrections
    }

    /// Load and parse a calibration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ColorError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| ColorError::serialization(path, e))
    }

    /// Load a calibration file, logging any failure and returning `None`
    pub fn load_or_warn(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(file) => {
                log::debug!(
                    "loaded calibration '{}' from {}",
                    file.method(),
                    path.display()
                );
                Some(file)
            }
            Err(ColorError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no calibration file at {}", path.display());
                None
            }
            Err(err) => {
                log::warn!("ignoring calibration: {}", err);
                None
            }
        }
    }

    /// Write the record atomically: a temporary file in the target
    /// directory is renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ColorError::serialization(path, e))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ColorError::io(dir, e))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| ColorError::io(temp.path(), e))?;
        temp.persist(path).map_err(|e| ColorError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        log::info!(
            "saved calibration '{}' to {}",
            self.method(),
            path.display()
        );
        Ok(())
    }
}
