//! Temperature and salinity dependence of pure-water absorption.
//!
//! aw(λ, T, S) = aw(λ) + ψT(λ) (T - T_ref) + ψS(λ) S
//!
//! The ψ coefficients are calibration data and come from the run
//! configuration as (wavelength nm, coefficient) pairs.

use serde::Deserialize;

use crate::spectrum::interpolate;

/// Ambient water state of one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterConditions {
    /// Sea surface temperature [°C]
    pub temperature: f64,
    /// Sea surface salinity [PSU]
    pub salinity: f64,
}

impl WaterConditions {
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.salinity.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaterCorrection {
    /// Temperature at which the bundled aw table holds [°C]
    #[serde(default = "default_reference_temperature")]
    pub reference_temperature: f64,
    /// ψT [m^-1 °C^-1]
    pub psi_t: Vec<(f64, f64)>,
    /// ψS [m^-1 PSU^-1]
    pub psi_s: Vec<(f64, f64)>,
}

fn default_reference_temperature() -> f64 {
    20.0
}

impl WaterCorrection {
    pub(crate) fn validate(&self) -> Result<(), String> {
        for (name, table) in [("psi_t", &self.psi_t), ("psi_s", &self.psi_s)] {
            if table.is_empty() {
                return Err(format!("{name} must not be empty"));
            }
            if !table.windows(2).all(|w| w[0].0 < w[1].0) {
                return Err(format!("{name} wavelengths must be strictly increasing"));
            }
            if table.iter().any(|(wl, v)| !wl.is_finite() || !v.is_finite()) {
                return Err(format!("{name} contains non-finite values"));
            }
        }
        if !self.reference_temperature.is_finite() {
            return Err("reference_temperature must be finite".to_string());
        }
        Ok(())
    }

    /// ψT and ψS resampled onto `grid`.
    pub fn coefficients_on(&self, grid: &[f64]) -> WaterCoefficients {
        let resample = |table: &[(f64, f64)]| -> Vec<f64> {
            let (xs, ys): (Vec<f64>, Vec<f64>) = table.iter().copied().unzip();
            grid.iter().map(|&wl| interpolate(&xs, &ys, wl)).collect()
        };

        WaterCoefficients {
            reference_temperature: self.reference_temperature,
            psi_t: resample(&self.psi_t),
            psi_s: resample(&self.psi_s),
        }
    }
}

/// Correction coefficients already on the model grid.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterCoefficients {
    reference_temperature: f64,
    psi_t: Vec<f64>,
    psi_s: Vec<f64>,
}

impl WaterCoefficients {
    /// Corrected water absorption, band by band.
    pub fn apply(&self, aw: &[f64], conditions: &WaterConditions) -> Vec<f64> {
        let dt = conditions.temperature - self.reference_temperature;
        aw.iter()
            .zip(self.psi_t.iter().zip(&self.psi_s))
            .map(|(aw, (psi_t, psi_s))| aw + psi_t * dt + psi_s * conditions.salinity)
            .collect()
    }
}
