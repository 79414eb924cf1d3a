//! Color science core
//!
//! Color value types, RGB <-> CIELab conversion, CIEDE2000 color
//! difference and quality-controlled averaging of samples.

pub mod averaging;
pub mod conversion;
pub mod delta_e;
pub mod model;

pub use averaging::{AveragingResult, QualityAverager};
pub use conversion::{ColorSpaceConverter, ConversionMethod};
pub use delta_e::{delta_e_cie2000, delta_e_cie76};
pub use model::{LabColor, RgbColor};
