//! Quasi-Analytical Algorithm (QAA v6) absorption estimator
//!
//! Converts remote sensing reflectance into the non-water absorption spectrum
//! that the Gaussian decomposition works on. The QAA steps follow the NASA
//! OCSSW reference (<https://oceancolor.gsfc.nasa.gov/docs/ocssw/qaa_8c_source.html>),
//! generalized from the fixed five-band set to any model grid that holds
//! bands near 443, 490, 555 and 670 nm:
//!
//! 1. **Step 0**: Convert Rrs to below-water reflectance, rrs = Rrs / (0.52 + 1.7 Rrs)
//! 2. **Step 1**: u = (sqrt(g0² + 4 g1 rrs) - g0) / (2 g1)
//! 3. **Step 2**: a(555) = aw(555) + 10^(c1 + c2 χ + c3 χ²),
//!    χ = log10((rrs443 + rrs490) / (rrs555 + 5 rrs670² / rrs490))
//! 4. **Step 3**: bbp(555) = u555 a(555) / (1 - u555) - bbw(555)
//! 5. **Step 4**: Y = 2 (1 - 1.2 exp(-0.9 rrs443 / rrs555))
//! 6. **Step 5**: bb(λ) = bbp(555) (555 / λ)^Y + bbw(λ), a(λ) = (1 - u) bb / u
//! 7. **Step 6**: non-water absorption anw(λ) = a(λ) - aw(λ)
//!
//! Unlike the full QAA the phytoplankton/CDOM split is not done here: the
//! Gaussian fit carries its own baseline term for the non-pigment part.
//!
//! ## References
//!
//! - Lee, Z., Carder, K. L., & Arnone, R. A. (2002). Deriving inherent optical properties
//!   from water color: a multiband quasi-analytical algorithm for optically deep waters.
//!   *Applied Optics*, 41(27), 5755-5772.
//! - Lee, Z., et al. (2009). Euphotic zone depth: Its derivation and implication to
//!   ocean-color remote sensing. *Journal of Geophysical Research*, 114, C01009.

use std::fmt;

use crate::error::RetrievalError;
use crate::flags::QualityFlags;
use crate::iop::constants;
use crate::iop::water::{WaterCoefficients, WaterConditions};
use crate::sat_bands::closest_band;
use crate::spectrum::Spectrum;

/// Relative Rrs uncertainty floor used when propagating uncertainty to absorption.
const MIN_RELATIVE_UNCERTAINTY: f64 = 1e-3;

/// QAA algorithm results
#[derive(Debug, Clone)]
pub struct QaaResult {
    pub wavelengths: Vec<f64>, // Wavelengths [nm]
    pub rrs: Vec<f64>,         // Below-water reflectance [sr^-1]
    pub u: Vec<f64>,           // U-ratio [dimensionless]
    pub a: Vec<f64>,           // Total absorption [m^-1]
    pub aw: Vec<f64>,          // Water absorption used [m^-1]
    pub bb: Vec<f64>,          // Total backscattering [m^-1]
    pub bbp: Vec<f64>,         // Particulate backscattering [m^-1]
    pub reference_wl: f64,     // Reference wavelength used [nm]
    pub spectral_slope_y: f64, // Spectral slope Y for bbp
    pub flags: QualityFlags,
    absorption: Spectrum,
}

impl QaaResult {
    /// Non-water absorption a - aw [m^-1], with propagated uncertainty when the
    /// reflectance carried one.
    pub fn absorption(&self) -> &Spectrum {
        &self.absorption
    }

    pub fn into_absorption(self) -> Spectrum {
        self.absorption
    }
}

/// QAA bound to one model grid. Built once per run and shared by all pixels.
#[derive(Debug, Clone)]
pub struct AbsorptionEstimator {
    wavelengths: Vec<f64>,
    aw: Vec<f64>,
    bbw: Vec<f64>,
    water: Option<WaterCoefficients>,
    // Bands whose absorption must be physically valid (the fit window)
    checked: Vec<usize>,
    i443: usize,
    i490: usize,
    i555: usize,
    i670: usize,
}

impl AbsorptionEstimator {
    pub fn new(
        wavelengths: &[f64],
        checked: Vec<usize>,
        water: Option<WaterCoefficients>,
    ) -> Result<Self, RetrievalError> {
        let band = |target: f64| -> Result<usize, RetrievalError> {
            match closest_band(wavelengths, target) {
                Some((i, wl)) if (wl - target).abs() <= constants::REFERENCE_BAND_TOLERANCE => {
                    Ok(i)
                }
                _ => Err(RetrievalError::inversion(
                    target,
                    format!(
                        "no grid band within {} nm of this QAA reference wavelength",
                        constants::REFERENCE_BAND_TOLERANCE
                    ),
                )),
            }
        };

        Ok(Self {
            aw: wavelengths
                .iter()
                .map(|&wl| constants::water_absorption(wl))
                .collect(),
            bbw: wavelengths
                .iter()
                .map(|&wl| constants::water_backscattering(wl))
                .collect(),
            i443: band(constants::BLUE_443)?,
            i490: band(constants::BLUE_490)?,
            i555: band(constants::LAMBDA_0)?,
            i670: band(constants::RED_670)?,
            wavelengths: wavelengths.to_vec(),
            water,
            checked,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Runs the QAA on reflectance already resampled onto the model grid.
    pub fn estimate(
        &self,
        reflectance: &Spectrum,
        conditions: Option<&WaterConditions>,
    ) -> Result<QaaResult, RetrievalError> {
        if reflectance.wavelengths() != self.wavelengths.as_slice() {
            return Err(RetrievalError::invalid(
                "reflectance is not on the model wavelength grid",
            ));
        }

        let mut flags = QualityFlags::empty();

        let aw = match &self.water {
            Some(coefficients) => match conditions {
                Some(conditions) if conditions.is_finite() => {
                    flags.set(QualityFlags::WATER_CORRECTED);
                    coefficients.apply(&self.aw, conditions)
                }
                _ => {
                    return Err(RetrievalError::invalid(
                        "temperature and salinity required for water correction",
                    ));
                }
            },
            None => self.aw.clone(),
        };

        // Convert rrs to below sea level (NASA formulation)
        let rrs: Vec<f64> = reflectance
            .values()
            .iter()
            .map(|&v| v / (constants::T0 + constants::T1 * v))
            .collect();

        // Step 1: Calculate the diffusion probabilities at each wavelengths
        let u: Vec<f64> = rrs
            .iter()
            .map(|&v| {
                ((constants::G0.powi(2) + 4.0 * constants::G1 * v).sqrt() - constants::G0)
                    / (2.0 * constants::G1)
            })
            .collect();

        // Step 2: Reference absorption coefficient
        let wvlref = self.wavelengths[self.i555];
        let (rrs_443, rrs_490, rrs_555, rrs_670) = (
            rrs[self.i443],
            rrs[self.i490],
            rrs[self.i555],
            rrs[self.i670],
        );

        let numer = rrs_443 + rrs_490;
        let denom = rrs_555 + 5.0 * (rrs_670 * rrs_670) / rrs_490;
        let ratio = numer / denom;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(RetrievalError::inversion(
                wvlref,
                "blue-green band ratio is not positive",
            ));
        }

        let aux = ratio.log10();
        let rho = constants::C1 + constants::C2 * aux + constants::C3 * aux.powi(2);
        let aref = aw[self.i555] + 10.0_f64.powf(rho);

        // Step 3: Calculate reference backscattering
        let u_ref = u[self.i555];
        let bbpref = u_ref * aref / (1.0 - u_ref) - self.bbw[self.i555];
        if !bbpref.is_finite() {
            return Err(RetrievalError::inversion(
                wvlref,
                "non-finite particulate backscattering",
            ));
        }

        // Step 4: Calculate spectral slope Y (NASA OCSSW formulation)
        let rat = rrs_443 / rrs_555;
        let y = (2.0 * (1.0 - 1.2 * (-0.9 * rat).exp())).clamp(0.0, 3.0);

        // Step 5: Total backscattering and absorption
        let bb: Vec<f64> = self
            .wavelengths
            .iter()
            .zip(&self.bbw)
            .map(|(&wl, &bbw)| bbpref * (wvlref / wl).powf(y) + bbw)
            .collect();

        let a: Vec<f64> = u
            .iter()
            .zip(&bb)
            .map(|(&u, &bb)| (1.0 - u) * bb / u)
            .collect();

        // Step 6: Remove water
        let anw: Vec<f64> = a.iter().zip(&aw).map(|(a, aw)| a - aw).collect();

        for &i in &self.checked {
            let wl = self.wavelengths[i];
            if !anw[i].is_finite() {
                return Err(RetrievalError::inversion(wl, "non-finite absorption"));
            }
            if anw[i] < 0.0 {
                return Err(RetrievalError::inversion(
                    wl,
                    format!("negative non-water absorption {:.3e} m^-1", anw[i]),
                ));
            }
        }

        let mut absorption = Spectrum::new(self.wavelengths.clone(), anw)?;
        if let Some(unc) = reflectance.uncertainty() {
            let propagated = unc
                .iter()
                .zip(reflectance.values())
                .zip(&a)
                .map(|((&sigma, &value), &a)| {
                    let relative = (sigma / value).max(MIN_RELATIVE_UNCERTAINTY);
                    a.abs() * relative
                })
                .collect();
            absorption = absorption.with_uncertainty(propagated)?;
        }

        let bbp = bb.iter().zip(&self.bbw).map(|(bb, bbw)| bb - bbw).collect();

        Ok(QaaResult {
            wavelengths: self.wavelengths.clone(),
            rrs,
            u,
            a,
            aw,
            bb,
            bbp,
            reference_wl: wvlref,
            spectral_slope_y: y,
            flags,
            absorption,
        })
    }
}

impl fmt::Display for QaaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QAA v6 (reference {} nm, Y = {:.4})",
            self.reference_wl, self.spectral_slope_y
        )?;
        writeln!(f, "{:>8} {:>12} {:>12} {:>12}", "nm", "a", "bbp", "anw")?;
        for (i, (wl, anw)) in self.absorption.iter().enumerate() {
            writeln!(
                f,
                "{:>8.1} {:>12.6} {:>12.6} {:>12.6}",
                wl, self.a[i], self.bbp[i], anw
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iop::water::WaterCorrection;

    const GRID: [f64; 5] = [412.0, 443.0, 490.0, 555.0, 670.0];
    const RRS: [f64; 5] = [0.0021, 0.0034, 0.0041, 0.0028, 0.0012];

    fn estimator(checked: Vec<usize>) -> AbsorptionEstimator {
        AbsorptionEstimator::new(&GRID, checked, None).unwrap()
    }

    fn reflectance(values: &[f64]) -> Spectrum {
        Spectrum::new(GRID.to_vec(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_reference_values() {
        let result = estimator(vec![0, 1, 2, 3])
            .estimate(&reflectance(&RRS), None)
            .unwrap();

        assert_eq!(result.reference_wl, 555.0);
        assert!((result.spectral_slope_y - 1.193674917867854).abs() < 1e-9);

        let expected = [
            0.22002169522524123,
            0.11262184681536716,
            0.06651503289432999,
            0.034860748130433106,
        ];
        for (got, want) in result.absorption().values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
        // 670 nm is outside the checked set and may go negative
        assert!(result.absorption().values()[4] < 0.0);
    }

    #[test]
    fn test_hyperspectral_grid() {
        let grid: Vec<f64> = (0..=60).map(|i| 400.0 + 5.0 * i as f64).collect();
        let values = grid
            .iter()
            .map(|&wl| crate::spectrum::interpolate(&GRID, &RRS, wl))
            .collect();
        let reflectance = Spectrum::new(grid.clone(), values).unwrap();

        let result = AbsorptionEstimator::new(&grid, vec![], None)
            .unwrap()
            .estimate(&reflectance, None)
            .unwrap();

        assert_eq!(result.reference_wl, 555.0);
        assert_eq!(result.wavelengths, grid);
        // Measured pure-water absorption in the orange-red rise
        assert!((result.aw[36] - 0.0894).abs() < 1e-3);
        assert!((result.aw[40] - 0.2224).abs() < 1e-12);
    }

    #[test]
    fn test_negative_absorption_in_fit_window_is_an_error() {
        let err = estimator(vec![0, 1, 2, 3, 4])
            .estimate(&reflectance(&RRS), None)
            .unwrap_err();

        assert!(matches!(
            err,
            RetrievalError::Inversion { wavelength, .. } if wavelength == 670.0
        ));
    }

    #[test]
    fn test_dark_blue_bands_fail_inversion() {
        let mut values = RRS;
        values[1] = 0.0;
        values[2] = 0.0;
        let err = estimator(vec![0, 1, 2, 3])
            .estimate(&reflectance(&values), None)
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Inversion { .. }));
    }

    #[test]
    fn test_missing_reference_band() {
        let result = AbsorptionEstimator::new(&[412.0, 443.0, 490.0, 555.0], vec![0], None);
        assert!(matches!(
            result,
            Err(RetrievalError::Inversion { wavelength, .. }) if wavelength == 670.0
        ));
    }

    #[test]
    fn test_water_correction_requires_conditions() {
        let correction: WaterCorrection = serde_json::from_str(
            r#"{"psi_t": [[400.0, 0.0], [700.0, 0.0]], "psi_s": [[400.0, 0.0], [700.0, 0.0]]}"#,
        )
        .unwrap();
        let estimator = AbsorptionEstimator::new(
            &GRID,
            vec![0, 1, 2, 3],
            Some(correction.coefficients_on(&GRID)),
        )
        .unwrap();

        assert!(matches!(
            estimator.estimate(&reflectance(&RRS), None),
            Err(RetrievalError::InvalidSpectrum(_))
        ));

        let conditions = WaterConditions {
            temperature: 12.0,
            salinity: 33.0,
        };
        let corrected = estimator
            .estimate(&reflectance(&RRS), Some(&conditions))
            .unwrap();
        assert!(corrected.flags.contains(QualityFlags::WATER_CORRECTED));

        // Zero coefficients reproduce the uncorrected result
        let plain = AbsorptionEstimator::new(&GRID, vec![0, 1, 2, 3], None)
            .unwrap()
            .estimate(&reflectance(&RRS), None)
            .unwrap();
        assert_eq!(corrected.absorption().values(), plain.absorption().values());
    }

    #[test]
    fn test_uncertainty_propagated() {
        let spectrum = reflectance(&RRS)
            .with_uncertainty(RRS.iter().map(|v| v * 0.05).collect())
            .unwrap();
        let result = estimator(vec![0, 1, 2, 3]).estimate(&spectrum, None).unwrap();

        let unc = result.absorption().uncertainty().unwrap();
        for (sigma, a) in unc.iter().zip(&result.a) {
            assert!((sigma - a * 0.05).abs() < 1e-12);
        }
    }

    #[test]
    fn test_exact_reflectance_keeps_a_relative_uncertainty_floor() {
        let spectrum = reflectance(&RRS).with_uncertainty(vec![0.0; 5]).unwrap();
        let result = estimator(vec![0, 1, 2, 3]).estimate(&spectrum, None).unwrap();

        let unc = result.absorption().uncertainty().unwrap();
        for (sigma, a) in unc.iter().zip(&result.a) {
            assert!(*sigma > 0.0);
            assert!((sigma - a.abs() * MIN_RELATIVE_UNCERTAINTY).abs() < 1e-15);
        }
    }
}
