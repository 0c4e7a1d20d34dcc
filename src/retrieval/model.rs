use crate::config::{ConfigError, RetrievalConfig};
use crate::error::RetrievalError;
use crate::flags::QualityFlags;
use crate::gaussian::{ConstrainedFitter, DesignMatrix, FitResult};
use crate::iop::{AbsorptionEstimator, QaaResult, WaterConditions};
use crate::pigments::{PigmentConcentration, PigmentMapper};
use crate::preprocess::{self, PreprocessOptions, Preprocessed};
use crate::spectrum::Spectrum;

use super::pixel::{PixelInput, PixelState};

/// Immutable per-run model: everything derived from the configuration that
/// every pixel shares. Built once and passed by reference to the workers.
#[derive(Debug, Clone)]
pub struct InversionModel {
    wavelengths: Vec<f64>,
    preprocess: PreprocessOptions,
    estimator: AbsorptionEstimator,
    fit_indices: Vec<usize>,
    design: DesignMatrix,
    fitter: ConstrainedFitter,
    mapper: PigmentMapper,
}

impl InversionModel {
    pub fn new(config: &RetrievalConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let wavelengths = config.wavelengths().to_vec();
        let fit_indices = config.fit_indices();
        let fit_wavelengths: Vec<f64> = fit_indices.iter().map(|&i| wavelengths[i]).collect();

        let water = config
            .water_correction()
            .map(|correction| correction.coefficients_on(&wavelengths));
        let estimator = AbsorptionEstimator::new(&wavelengths, fit_indices.clone(), water)
            .map_err(|e| ConfigError::Model(e.to_string()))?;

        let mapper = PigmentMapper::new(
            config.basis_set(),
            config.regression_coefficients(),
            config.concentration_epsilon(),
            config.require_convergence(),
        )
        .map_err(ConfigError::Regression)?;

        let design = config.basis_set().design_matrix(&fit_wavelengths);
        log::debug!(
            "Design matrix {}x{} over {:?} nm",
            design.matrix().nrows(),
            design.matrix().ncols(),
            fit_wavelengths
        );

        Ok(Self {
            wavelengths,
            preprocess: config.preprocess_options(),
            estimator,
            fit_indices,
            design,
            fitter: ConstrainedFitter::new(config.fit_options()),
            mapper,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn fit_wavelengths(&self) -> &[f64] {
        self.design.wavelengths()
    }

    pub fn design(&self) -> &DesignMatrix {
        &self.design
    }

    /// Pigment labels in output order.
    pub fn pigments(&self) -> Vec<String> {
        self.mapper.pigments().map(str::to_string).collect()
    }

    pub fn preprocess(&self, raw: &Spectrum) -> Result<Preprocessed, RetrievalError> {
        preprocess::preprocess(raw, &self.wavelengths, &self.preprocess)
    }

    /// Full QAA output on the model grid.
    pub fn qaa(
        &self,
        reflectance: &Spectrum,
        conditions: Option<&WaterConditions>,
    ) -> Result<QaaResult, RetrievalError> {
        self.estimator.estimate(reflectance, conditions)
    }

    /// Non-water absorption restricted to the fit window.
    pub fn estimate_absorption(
        &self,
        reflectance: &Spectrum,
        conditions: Option<&WaterConditions>,
    ) -> Result<(Spectrum, QualityFlags), RetrievalError> {
        let qaa = self.qaa(reflectance, conditions)?;
        let flags = qaa.flags;
        Ok((qaa.absorption().select(&self.fit_indices), flags))
    }

    pub fn fit(&self, absorption: &Spectrum) -> Result<FitResult, RetrievalError> {
        self.fitter.fit(&self.design, absorption)
    }

    pub fn map(&self, fit: &FitResult) -> PigmentConcentration {
        self.mapper.map(fit)
    }

    /// Drives one pixel from `Pending` to a terminal state.
    pub fn retrieve(&self, input: &PixelInput) -> PixelState {
        let mut state = PixelState::Pending;
        while !state.is_terminal() {
            state = state.advance(self, input);
        }
        state
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gaussian::{Baseline, FitOptions, GaussianBand};
    use crate::iop::WaterCorrection;
    use crate::pigments::RegressionModel;
    use std::collections::BTreeMap;

    pub(crate) const GRID: [f64; 5] = [412.0, 443.0, 490.0, 555.0, 670.0];
    pub(crate) const RRS: [f64; 5] = [0.0021, 0.0034, 0.0041, 0.0028, 0.0012];

    pub(crate) fn fixture_config() -> RetrievalConfig {
        let bands = vec![
            GaussianBand::new(440.0, 20.0, "chla"),
            GaussianBand::new(470.0, 14.0, "chlb"),
            GaussianBand::new(500.0, 16.0, "ppc"),
        ];
        let coefficients = BTreeMap::from([
            (
                "chla".to_string(),
                RegressionModel::PowerLaw {
                    scale: 96.5,
                    exponent: 1.06,
                },
            ),
            (
                "chlb".to_string(),
                RegressionModel::Linear {
                    slope: 15.0,
                    intercept: 0.0,
                },
            ),
            (
                "ppc".to_string(),
                RegressionModel::Polynomial {
                    coefficients: vec![0.01, 20.0],
                },
            ),
        ]);

        RetrievalConfig::new(GRID.to_vec(), bands, Baseline::None, coefficients)
            .unwrap()
            .with_fit_window(400.0, 600.0)
    }

    pub(crate) fn fixture_model() -> InversionModel {
        InversionModel::new(&fixture_config()).unwrap()
    }

    fn fixture_input() -> PixelInput {
        PixelInput::new(Spectrum::new(GRID.to_vec(), RRS.to_vec()).unwrap())
    }

    fn assert_relative(actual: f64, expected: f64) {
        let scale = expected.abs().max(1e-12);
        assert!(
            (actual - expected).abs() / scale < 1e-6,
            "{actual} != {expected}"
        );
    }

    #[test]
    fn test_model_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<InversionModel>();
    }

    #[test]
    fn test_end_to_end_fixture() {
        let model = fixture_model();
        assert_eq!(model.fit_wavelengths(), &[412.0, 443.0, 490.0, 555.0]);
        assert_eq!(model.pigments(), vec!["chla", "chlb", "ppc"]);

        let retrieval = model.retrieve(&fixture_input()).into_result().unwrap();

        let fit = &retrieval.fit;
        assert!(fit.converged);
        assert!(!fit.rank_deficient);
        assert_relative(fit.amplitudes[0], 0.17326403228728132);
        assert_eq!(fit.amplitudes[1], 0.0);
        assert_relative(fit.amplitudes[2], 0.0715937801973322);

        let concentration = &retrieval.concentration;
        assert!(concentration.is_valid());
        assert_relative(concentration.get("chla").unwrap(), 15.050753247514754);
        assert_eq!(concentration.get("chlb"), Some(0.0));
        assert_relative(concentration.get("ppc").unwrap(), 1.441875603946644);
        assert!(concentration.iter().all(|(_, c)| c >= 0.0));

        // On-grid input with no clamping of non-zero values
        assert_eq!(retrieval.flags, QualityFlags::empty());
    }

    #[test]
    fn test_absorption_is_restricted_to_fit_window() {
        let model = fixture_model();
        let reflectance = model.preprocess(&fixture_input().reflectance).unwrap();
        let (absorption, _) = model
            .estimate_absorption(&reflectance.reflectance, None)
            .unwrap();

        assert_eq!(absorption.wavelengths(), model.fit_wavelengths());
        assert_relative(absorption.values()[0], 0.22002169522524123);
        assert_relative(absorption.values()[3], 0.034860748130433106);
    }

    #[test]
    fn test_full_grid_fit_rejects_negative_red_absorption() {
        // Same model without a fit window: 670 nm is checked too
        let windowed = fixture_config();
        let config = RetrievalConfig::new(
            windowed.wavelengths().to_vec(),
            windowed.basis_set().bands().to_vec(),
            Baseline::None,
            windowed.regression_coefficients().clone(),
        )
        .unwrap();
        let model = InversionModel::new(&config).unwrap();

        let err = model.retrieve(&fixture_input()).into_result().unwrap_err();
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn test_iteration_limit_is_flagged() {
        let config = fixture_config().with_fit_options(FitOptions {
            tolerance: 1e-9,
            max_iterations: 1,
        });
        let strict = InversionModel::new(&config).unwrap();
        let lenient = InversionModel::new(&config.with_require_convergence(false)).unwrap();

        let rejected = strict.retrieve(&fixture_input()).into_result().unwrap();
        assert!(!rejected.fit.converged);
        assert!(!rejected.concentration.is_valid());
        assert!(rejected.flags.contains(QualityFlags::NOT_CONVERGED));
        assert!(rejected.flags.contains(QualityFlags::INVALID));

        let accepted = lenient.retrieve(&fixture_input()).into_result().unwrap();
        assert!(accepted.concentration.is_valid());
        assert!(accepted.flags.contains(QualityFlags::NOT_CONVERGED));
    }

    #[test]
    fn test_water_correction_needs_conditions() {
        let correction: WaterCorrection = serde_json::from_str(
            r#"{"psi_t": [[400, 0.0001], [700, 0.0005]], "psi_s": [[400, 0.00002], [700, 0.00001]]}"#,
        )
        .unwrap();
        let model =
            InversionModel::new(&fixture_config().with_water_correction(correction)).unwrap();

        let err = model.retrieve(&fixture_input()).into_result().unwrap_err();
        assert_eq!(err.code(), 1);

        let corrected = model
            .retrieve(&fixture_input().with_conditions(20.0, 0.0))
            .into_result()
            .unwrap();
        assert!(corrected.flags.contains(QualityFlags::WATER_CORRECTED));
    }

    #[test]
    fn test_missing_reference_band_is_a_config_error() {
        let config = RetrievalConfig::new(
            vec![412.0, 443.0, 490.0, 555.0],
            fixture_config().basis_set().bands().to_vec(),
            Baseline::None,
            fixture_config().regression_coefficients().clone(),
        )
        .unwrap();

        assert!(matches!(
            InversionModel::new(&config),
            Err(ConfigError::Model(_))
        ));
    }

    #[test]
    fn test_bundled_sample_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/config/gpig_config.json");
        let config = RetrievalConfig::from_file(path).unwrap();
        let model = InversionModel::new(&config).unwrap();

        assert_eq!(model.wavelengths().len(), 121);
        assert_eq!(model.pigments(), vec!["chla", "chlb", "chlc", "ppc"]);
        // 12 bands plus the exponential baseline over 400-700 nm
        assert_eq!(model.design().matrix().shape(), (121, 13));
    }

    #[test]
    fn test_resampled_input() {
        let model = fixture_model();
        let input = PixelInput::new(
            Spectrum::new(
                vec![400.0, 443.0, 490.0, 510.0, 555.0, 670.0, 700.0],
                vec![0.0019, 0.0034, 0.0041, 0.0037, 0.0028, 0.0012, 0.0004],
            )
            .unwrap(),
        );

        let retrieval = model.retrieve(&input).into_result().unwrap();
        assert!(retrieval.flags.contains(QualityFlags::RESAMPLED));
    }
}
