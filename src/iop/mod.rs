//! Inherent Optical Properties (IOP) module
//!
//! Reflectance-to-absorption inversion and the water optical constants it
//! relies on.

pub mod constants;
pub mod qaa;
pub mod water;

pub use qaa::{AbsorptionEstimator, QaaResult};
pub use water::{WaterConditions, WaterCorrection};
