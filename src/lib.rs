//! Phytoplankton pigment retrieval from ocean-color reflectance.
//!
//! Per pixel: reflectance is validated and resampled, inverted to non-water
//! absorption with the QAA, decomposed into fixed Gaussian bands by
//! non-negative least squares, and the band amplitudes are mapped to pigment
//! concentrations. Pixels are independent and processed in parallel.

pub mod bbox;
pub mod config;
pub mod error;
pub mod flags;
pub mod gaussian;
pub mod iop;
pub mod pigments;
pub mod preprocess;
pub mod readers;
pub mod retrieval;
pub mod sat_bands;
pub mod spectrum;
pub mod utils;
pub mod writers;

pub use config::{ConfigError, RetrievalConfig};
pub use error::RetrievalError;
pub use flags::QualityFlags;
pub use retrieval::{BatchRunner, InversionModel, PigmentGrid, PixelInput, ReflectanceGrid};
pub use spectrum::Spectrum;
