use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::bbox::Bbox;
use crate::gaussian::{Baseline, BasisSet, FitOptions, GaussianBand};
use crate::iop::WaterCorrection;
use crate::pigments::RegressionModel;
use crate::preprocess::PreprocessOptions;
use crate::sat_bands::{SatBands, Sensor};
use crate::spectrum::is_strictly_increasing;

pub mod error;
pub use error::ConfigError;

/// Wavelength range [nm] whose absorption enters the Gaussian fit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FitWindow {
    pub min: f64,
    pub max: f64,
}

impl FitWindow {
    pub fn contains(&self, wavelength: f64) -> bool {
        (self.min..=self.max).contains(&wavelength)
    }
}

/// Where the binary finds one Rrs raster per grid wavelength. `{}` in the
/// patterns is replaced by the integer wavelength.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RasterInputs {
    pub directory: String,
    pub filename_pattern: String,
    pub uncertainty_pattern: Option<String>,
    /// Sea surface temperature [°C] raster, needed by the water correction
    pub temperature_file: Option<String>,
    /// Sea surface salinity [PSU] raster
    pub salinity_file: Option<String>,
}

/// Everything fixed for a run: grid, basis set, regressions and solver policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    wavelengths: Vec<f64>,
    fit_window: Option<FitWindow>,
    basis_set: BasisSet,
    regression_coefficients: BTreeMap<String, RegressionModel>,
    convergence_tolerance: f64,
    max_iterations: usize,
    require_convergence: bool,
    min_valid_bands: usize,
    max_invalid_fraction: f64,
    min_reflectance: f64,
    concentration_epsilon: f64,
    water_correction: Option<WaterCorrection>,
    bbox: Option<Bbox>,
    threads: Option<usize>,
    inputs: Option<RasterInputs>,
    output_directory: Option<String>,
}

// Deserializes through a helper so the grid, basis and options are validated
// before a RetrievalConfig exists.
impl<'de> Deserialize<'de> for RetrievalConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            wavelengths: Option<Vec<f64>>,
            sensor: Option<Sensor>,
            fit_window: Option<FitWindow>,
            basis_set: Vec<GaussianBand>,
            #[serde(default)]
            baseline: Baseline,
            regression_coefficients: BTreeMap<String, RegressionModel>,
            convergence_tolerance: Option<f64>,
            max_iterations: Option<usize>,
            require_convergence: Option<bool>,
            min_valid_bands: Option<usize>,
            max_invalid_fraction: Option<f64>,
            min_reflectance: Option<f64>,
            concentration_epsilon: Option<f64>,
            water_correction: Option<WaterCorrection>,
            bbox: Option<BboxHelper>,
            threads: Option<usize>,
            inputs: Option<RasterInputs>,
            output_directory: Option<String>,
        }

        #[derive(Deserialize)]
        struct BboxHelper {
            xmin: f64,
            xmax: f64,
            ymin: f64,
            ymax: f64,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let wavelengths = match (helper.wavelengths, helper.sensor) {
            (Some(wavelengths), _) => wavelengths,
            (None, Some(sensor)) => SatBands::new(sensor).wavelengths().to_vec(),
            (None, None) => {
                return Err(D::Error::custom(ConfigError::Grid(
                    "either wavelengths or sensor is required".to_string(),
                )));
            }
        };

        let bbox = match helper.bbox {
            Some(b) => Some(
                Bbox::new(b.xmin, b.xmax, b.ymin, b.ymax)
                    .map_err(|e| D::Error::custom(ConfigError::Bbox(e)))?,
            ),
            None => None,
        };

        let defaults = PreprocessOptions::default();
        let fit_defaults = FitOptions::default();

        let mut config = RetrievalConfig::new(
            wavelengths,
            helper.basis_set,
            helper.baseline,
            helper.regression_coefficients,
        )
        .map_err(D::Error::custom)?;

        config.fit_window = helper.fit_window;
        config.convergence_tolerance = helper
            .convergence_tolerance
            .unwrap_or(fit_defaults.tolerance);
        config.max_iterations = helper
            .max_iterations
            .unwrap_or(fit_defaults.max_iterations);
        config.require_convergence = helper.require_convergence.unwrap_or(true);
        config.min_valid_bands = helper.min_valid_bands.unwrap_or(defaults.min_valid_bands);
        config.max_invalid_fraction = helper
            .max_invalid_fraction
            .unwrap_or(defaults.max_invalid_fraction);
        config.min_reflectance = helper.min_reflectance.unwrap_or(defaults.min_reflectance);
        config.concentration_epsilon = helper
            .concentration_epsilon
            .unwrap_or(DEFAULT_CONCENTRATION_EPSILON);
        config.water_correction = helper.water_correction;
        config.bbox = bbox;
        config.threads = helper.threads;
        config.inputs = helper.inputs;
        config.output_directory = helper.output_directory;

        config.validate().map_err(D::Error::custom)?;
        Ok(config)
    }
}

const DEFAULT_CONCENTRATION_EPSILON: f64 = 1e-9;

impl RetrievalConfig {
    /// Configuration with default solver and acceptance options.
    pub fn new(
        wavelengths: Vec<f64>,
        bands: Vec<GaussianBand>,
        baseline: Baseline,
        regression_coefficients: BTreeMap<String, RegressionModel>,
    ) -> Result<Self, ConfigError> {
        let basis_set = BasisSet::new(bands, baseline).map_err(ConfigError::Basis)?;
        let defaults = PreprocessOptions::default();
        let fit_defaults = FitOptions::default();

        let config = Self {
            wavelengths,
            fit_window: None,
            basis_set,
            regression_coefficients,
            convergence_tolerance: fit_defaults.tolerance,
            max_iterations: fit_defaults.max_iterations,
            require_convergence: true,
            min_valid_bands: defaults.min_valid_bands,
            max_invalid_fraction: defaults.max_invalid_fraction,
            min_reflectance: defaults.min_reflectance,
            concentration_epsilon: DEFAULT_CONCENTRATION_EPSILON,
            water_correction: None,
            bbox: None,
            threads: None,
            inputs: None,
            output_directory: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RetrievalConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: RetrievalConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Checks the cross-field constraints. Called on load and again when a
    /// model is built, so builder-modified configs are covered too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wavelengths.is_empty() {
            return Err(ConfigError::Grid("no wavelengths".to_string()));
        }
        if self.wavelengths.iter().any(|wl| !(wl.is_finite() && *wl > 0.0)) {
            return Err(ConfigError::Grid(
                "wavelengths must be finite and positive".to_string(),
            ));
        }
        if !is_strictly_increasing(&self.wavelengths) {
            return Err(ConfigError::Grid(
                "wavelengths must be strictly increasing".to_string(),
            ));
        }

        if let Some(window) = self.fit_window {
            if !self.wavelengths.iter().any(|&wl| window.contains(wl)) {
                return Err(ConfigError::FitWindow {
                    min: window.min,
                    max: window.max,
                });
            }
        }

        if self.regression_coefficients.is_empty() {
            return Err(ConfigError::Regression(
                "at least one pigment regression is required".to_string(),
            ));
        }
        for (pigment, model) in &self.regression_coefficients {
            model
                .validate()
                .map_err(|e| ConfigError::Regression(format!("{pigment}: {e}")))?;
            if self.basis_set.indices_for(pigment).is_empty() {
                return Err(ConfigError::Regression(format!(
                    "no basis band is labelled '{pigment}'"
                )));
            }
        }

        if !(self.convergence_tolerance.is_finite() && self.convergence_tolerance > 0.0) {
            return Err(ConfigError::option(
                "convergence_tolerance",
                "must be finite and positive",
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::option("max_iterations", "must be at least 1"));
        }
        if self.min_valid_bands == 0 {
            return Err(ConfigError::option("min_valid_bands", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.max_invalid_fraction) {
            return Err(ConfigError::option(
                "max_invalid_fraction",
                "must be between 0 and 1",
            ));
        }
        if !self.min_reflectance.is_finite() {
            return Err(ConfigError::option("min_reflectance", "must be finite"));
        }
        if !(self.concentration_epsilon.is_finite() && self.concentration_epsilon >= 0.0) {
            return Err(ConfigError::option(
                "concentration_epsilon",
                "must be finite and non-negative",
            ));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::option("threads", "must be at least 1"));
        }
        if let Some(correction) = &self.water_correction {
            correction
                .validate()
                .map_err(ConfigError::WaterCorrection)?;
        }

        Ok(())
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn fit_window(&self) -> Option<FitWindow> {
        self.fit_window
    }

    /// Grid positions used by the fit: the whole grid without a fit window.
    pub fn fit_indices(&self) -> Vec<usize> {
        self.wavelengths
            .iter()
            .enumerate()
            .filter(|(_, wl)| self.fit_window.is_none_or(|w| w.contains(**wl)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn basis_set(&self) -> &BasisSet {
        &self.basis_set
    }

    pub fn regression_coefficients(&self) -> &BTreeMap<String, RegressionModel> {
        &self.regression_coefficients
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            tolerance: self.convergence_tolerance,
            max_iterations: self.max_iterations,
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            min_valid_bands: self.min_valid_bands,
            max_invalid_fraction: self.max_invalid_fraction,
            min_reflectance: self.min_reflectance,
        }
    }

    pub fn require_convergence(&self) -> bool {
        self.require_convergence
    }

    pub fn concentration_epsilon(&self) -> f64 {
        self.concentration_epsilon
    }

    pub fn water_correction(&self) -> Option<&WaterCorrection> {
        self.water_correction.as_ref()
    }

    pub fn bbox(&self) -> Option<&Bbox> {
        self.bbox.as_ref()
    }

    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    pub fn inputs(&self) -> Option<&RasterInputs> {
        self.inputs.as_ref()
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.output_directory.as_deref()
    }

    pub fn with_fit_window(mut self, min: f64, max: f64) -> Self {
        self.fit_window = Some(FitWindow { min, max });
        self
    }

    pub fn with_fit_options(mut self, options: FitOptions) -> Self {
        self.convergence_tolerance = options.tolerance;
        self.max_iterations = options.max_iterations;
        self
    }

    pub fn with_preprocess_options(mut self, options: PreprocessOptions) -> Self {
        self.min_valid_bands = options.min_valid_bands;
        self.max_invalid_fraction = options.max_invalid_fraction;
        self.min_reflectance = options.min_reflectance;
        self
    }

    pub fn with_require_convergence(mut self, require: bool) -> Self {
        self.require_convergence = require;
        self
    }

    pub fn with_water_correction(mut self, correction: WaterCorrection) -> Self {
        self.water_correction = Some(correction);
        self
    }

    pub fn with_bbox(mut self, bbox: Bbox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}
