//! Error types for the stamp_colors library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stamp_colors operations
pub type Result<T> = std::result::Result<T, ColorError>;

/// Errors raised at the boundaries of the color core.
///
/// Missing calibration is not an error here: an
/// uncalibrated session is a normal state, not a failure.
#[derive(Error, Debug)]
pub enum ColorError {
    /// A channel value was non-finite or outside its documented range
    #[error("Invalid {channel} channel value: {value}")]
    InvalidChannel { channel: &'static str, value: f64 },

    /// Lab and RGB sample lists must pair up one to one
    #[error("Sample count mismatch: {lab} Lab values vs {rgb} RGB values")]
    SampleCountMismatch { lab: usize, rgb: usize },

    /// Averaging was requested over an empty sample set
    #[error("No samples supplied for averaging")]
    NoSamples,

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// File could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON content could not be parsed or produced
    #[error("Malformed JSON in {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Atomic replace of a persisted file failed
    #[error("Could not replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image file could not be loaded or decoded
    #[error("Failed to load image: {message}")]
    ImageLoad {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ColorError {
    /// Create an I/O error tied to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error tied to a path
    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }

    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoad {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Check if this error leaves the session usable (uncalibrated)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ColorError::Io { .. } | ColorError::Serialization { .. } | ColorError::Persist { .. }
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self {
            ColorError::InvalidChannel { channel, value } => format!(
                "The {} value {} is not a valid color channel (expected 0-255).",
                channel, value
            ),
            ColorError::SampleCountMismatch { .. } => {
                "Every sample needs both a Lab and an RGB value.".to_string()
            }
            ColorError::NoSamples => "Place at least one sample before averaging.".to_string(),
            ColorError::Io { .. } | ColorError::Serialization { .. } => {
                "The calibration file could not be read. Continuing uncalibrated.".to_string()
            }
            ColorError::Persist { .. } => {
                "The calibration could not be saved. The previous calibration is unchanged."
                    .to_string()
            }
            ColorError::ImageLoad { .. } => {
                "Could not load the image. Please check the file format and try again.".to_string()
            }
            ColorError::InvalidParameter { parameter, value } => {
                format!("Invalid setting {}: {}", parameter, value)
            }
        }
    }
}
