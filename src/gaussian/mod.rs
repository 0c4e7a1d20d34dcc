//! Gaussian decomposition of absorption spectra.

pub mod basis;
pub mod nnls;

pub use basis::{Baseline, BasisSet, DesignMatrix, GaussianBand};
pub use nnls::{ConstrainedFitter, FitOptions, FitResult, NnlsSolution, nnls};
