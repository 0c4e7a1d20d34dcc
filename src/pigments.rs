//! Empirical mapping from Gaussian amplitudes to pigment concentrations.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::flags::QualityFlags;
use crate::gaussian::{BasisSet, FitResult};

/// Regression from the summed amplitude x [m^-1] of a pigment's bands to
/// its concentration [mg m^-3].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RegressionModel {
    /// slope · x + intercept
    Linear { slope: f64, intercept: f64 },
    /// c0 + c1 x + c2 x² + ...
    Polynomial { coefficients: Vec<f64> },
    /// scale · x^exponent
    PowerLaw { scale: f64, exponent: f64 },
}

impl RegressionModel {
    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            RegressionModel::Linear { slope, intercept } => slope * x + intercept,
            RegressionModel::Polynomial { coefficients } => coefficients
                .iter()
                .rev()
                .fold(0.0, |acc, c| acc * x + c),
            RegressionModel::PowerLaw { scale, exponent } => scale * x.powf(*exponent),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            RegressionModel::Linear { slope, intercept } => {
                if !(slope.is_finite() && intercept.is_finite()) {
                    return Err("linear coefficients must be finite".to_string());
                }
            }
            RegressionModel::Polynomial { coefficients } => {
                if coefficients.is_empty() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("polynomial needs at least one finite coefficient".to_string());
                }
            }
            RegressionModel::PowerLaw { scale, exponent } => {
                if !scale.is_finite() || !(exponent.is_finite() && *exponent > 0.0) {
                    return Err("power law needs a finite scale and a positive exponent".to_string());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PigmentRegression {
    pub pigment: String,
    /// Basis positions whose amplitudes are summed
    pub bands: Vec<usize>,
    pub model: RegressionModel,
}

/// Concentrations for one pixel, keyed by pigment label [mg m^-3].
#[derive(Debug, Clone, PartialEq)]
pub struct PigmentConcentration {
    values: BTreeMap<String, f64>,
    valid: bool,
    flags: QualityFlags,
}

impl PigmentConcentration {
    pub fn get(&self, pigment: &str) -> Option<f64> {
        self.values.get(pigment).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn flags(&self) -> QualityFlags {
        self.flags
    }
}

/// Applies the per-pigment regressions. Shared read-only by every pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PigmentMapper {
    regressions: Vec<PigmentRegression>,
    epsilon: f64,
    require_convergence: bool,
}

impl PigmentMapper {
    pub fn new(
        basis: &BasisSet,
        coefficients: &BTreeMap<String, RegressionModel>,
        epsilon: f64,
        require_convergence: bool,
    ) -> Result<Self, String> {
        if coefficients.is_empty() {
            return Err("at least one regression is required".to_string());
        }
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err("concentration epsilon must be finite and non-negative".to_string());
        }

        let regressions = coefficients
            .iter()
            .map(|(pigment, model)| {
                model
                    .validate()
                    .map_err(|e| format!("regression for '{pigment}': {e}"))?;
                let bands = basis.indices_for(pigment);
                if bands.is_empty() {
                    return Err(format!("no basis band is labelled '{pigment}'"));
                }
                Ok(PigmentRegression {
                    pigment: pigment.clone(),
                    bands,
                    model: model.clone(),
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self {
            regressions,
            epsilon,
            require_convergence,
        })
    }

    /// Pigment labels in output order.
    pub fn pigments(&self) -> impl Iterator<Item = &str> {
        self.regressions.iter().map(|r| r.pigment.as_str())
    }

    pub fn len(&self) -> usize {
        self.regressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regressions.is_empty()
    }

    pub fn map(&self, fit: &FitResult) -> PigmentConcentration {
        let mut flags = QualityFlags::empty();
        let mut valid = true;

        let values = self
            .regressions
            .iter()
            .map(|regression| {
                let x: f64 = regression.bands.iter().map(|&i| fit.amplitudes[i]).sum();
                let mut concentration = regression.model.evaluate(x);
                if !concentration.is_finite() {
                    valid = false;
                } else if concentration < self.epsilon {
                    if concentration != 0.0 {
                        flags.set(QualityFlags::CONCENTRATION_CLAMPED);
                    }
                    concentration = 0.0;
                }
                (regression.pigment.clone(), concentration)
            })
            .collect();

        if !fit.converged {
            flags.set(QualityFlags::NOT_CONVERGED);
            if self.require_convergence {
                valid = false;
            }
        }
        if !valid {
            flags.set(QualityFlags::INVALID);
        }

        PigmentConcentration {
            values,
            valid,
            flags,
        }
    }
}
