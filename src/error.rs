use thiserror::Error;

/// Per-pixel retrieval failure.
///
/// None of these are fatal to a batch: the orchestrator records the failure
/// in the pixel's slot and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    /// Input reflectance cannot be used (coverage, missing values, malformed).
    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(String),
    /// The bio-optical inversion produced physically implausible absorption.
    #[error("absorption inversion failed at {wavelength} nm: {reason}")]
    Inversion { wavelength: f64, reason: String },
    /// Malformed numerical input to the solver.
    #[error("fit error: {0}")]
    Fit(String),
}

impl RetrievalError {
    /// Reason code written to the status layer of gridded output.
    pub fn code(&self) -> u8 {
        match self {
            RetrievalError::InvalidSpectrum(_) => 1,
            RetrievalError::Inversion { .. } => 2,
            RetrievalError::Fit(_) => 3,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RetrievalError::InvalidSpectrum(reason.into())
    }

    pub(crate) fn inversion(wavelength: f64, reason: impl Into<String>) -> Self {
        RetrievalError::Inversion {
            wavelength,
            reason: reason.into(),
        }
    }
}
