use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wavelength grid: {0}")]
    Grid(String),
    #[error("basis set: {0}")]
    Basis(String),
    #[error("regression coefficients: {0}")]
    Regression(String),
    #[error("fit window {min}-{max} nm selects no grid wavelength")]
    FitWindow { min: f64, max: f64 },
    #[error("{name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("Invalid bbox: {0}")]
    Bbox(String),
    #[error("water correction: {0}")]
    WaterCorrection(String),
    #[error("absorption model: {0}")]
    Model(String),
}

impl ConfigError {
    pub(crate) fn option(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidOption {
            name,
            reason: reason.into(),
        }
    }
}
