//! Validation and resampling of raw reflectance onto the model grid.

use crate::error::RetrievalError;
use crate::flags::QualityFlags;
use crate::spectrum::{Spectrum, interpolate};

/// Acceptance thresholds for raw reflectance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Minimum number of usable input bands.
    pub min_valid_bands: usize,
    /// Largest tolerated share of missing or below-threshold bands.
    pub max_invalid_fraction: f64,
    /// Values below this are treated as missing [sr^-1].
    pub min_reflectance: f64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            min_valid_bands: 3,
            max_invalid_fraction: 0.5,
            min_reflectance: 0.0,
        }
    }
}

/// Resampled reflectance plus the flags raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub reflectance: Spectrum,
    pub flags: QualityFlags,
}

/// Validates `raw` and linearly interpolates its usable bands onto `grid`.
///
/// The returned spectrum has exactly the grid wavelengths and no missing values.
pub fn preprocess(
    raw: &Spectrum,
    grid: &[f64],
    options: &PreprocessOptions,
) -> Result<Preprocessed, RetrievalError> {
    if raw.is_empty() {
        return Err(RetrievalError::invalid("empty spectrum"));
    }

    let usable = |i: usize| {
        let value = raw.values()[i];
        let uncertainty_ok = raw
            .uncertainty()
            .is_none_or(|unc| unc[i].is_finite() && unc[i] >= 0.0);
        value.is_finite() && value >= options.min_reflectance && uncertainty_ok
    };
    let valid: Vec<usize> = (0..raw.len()).filter(|&i| usable(i)).collect();

    let invalid_fraction = (raw.len() - valid.len()) as f64 / raw.len() as f64;
    if invalid_fraction > options.max_invalid_fraction {
        return Err(RetrievalError::invalid(format!(
            "{:.0}% of bands missing or below {} (limit {:.0}%)",
            invalid_fraction * 100.0,
            options.min_reflectance,
            options.max_invalid_fraction * 100.0
        )));
    }
    if valid.is_empty() || valid.len() < options.min_valid_bands {
        return Err(RetrievalError::invalid(format!(
            "{} valid bands, at least {} required",
            valid.len(),
            options.min_valid_bands
        )));
    }

    let wavelengths: Vec<f64> = valid.iter().map(|&i| raw.wavelengths()[i]).collect();
    let values: Vec<f64> = valid.iter().map(|&i| raw.values()[i]).collect();

    let (first, last) = (wavelengths[0], wavelengths[wavelengths.len() - 1]);
    if let Some(&outside) = grid.iter().find(|&&wl| wl < first || wl > last) {
        return Err(RetrievalError::invalid(format!(
            "grid wavelength {outside} nm outside valid input range {first}-{last} nm"
        )));
    }

    let mut flags = QualityFlags::empty();
    if grid.iter().any(|wl| !wavelengths.contains(wl)) {
        flags.set(QualityFlags::RESAMPLED);
    }

    let resampled: Vec<f64> = grid
        .iter()
        .map(|&wl| interpolate(&wavelengths, &values, wl))
        .collect();
    let mut reflectance = Spectrum::new(grid.to_vec(), resampled)?;

    if let Some(unc) = raw.uncertainty() {
        let unc: Vec<f64> = valid.iter().map(|&i| unc[i]).collect();
        let resampled_unc = grid
            .iter()
            .map(|&wl| interpolate(&wavelengths, &unc, wl))
            .collect();
        reflectance = reflectance.with_uncertainty(resampled_unc)?;
    }

    Ok(Preprocessed { reflectance, flags })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: [f64; 5] = [412.0, 443.0, 490.0, 555.0, 670.0];

    fn options() -> PreprocessOptions {
        PreprocessOptions::default()
    }

    #[test]
    fn test_same_grid_passes_through() {
        let raw = Spectrum::new(GRID.to_vec(), vec![0.0021, 0.0034, 0.0041, 0.0028, 0.0012])
            .unwrap();
        let out = preprocess(&raw, &GRID, &options()).unwrap();

        assert_eq!(out.reflectance.values(), raw.values());
        assert!(!out.flags.contains(QualityFlags::RESAMPLED));
    }

    #[test]
    fn test_resamples_onto_grid() {
        let raw = Spectrum::new(
            vec![400.0, 450.0, 500.0, 600.0, 700.0],
            vec![0.002, 0.003, 0.004, 0.002, 0.001],
        )
        .unwrap();
        let out = preprocess(&raw, &[425.0, 500.0, 650.0], &options()).unwrap();

        assert_eq!(out.reflectance.wavelengths(), &[425.0, 500.0, 650.0]);
        let values = out.reflectance.values();
        assert!((values[0] - 0.0025).abs() < 1e-12);
        assert_eq!(values[1], 0.004);
        assert!((values[2] - 0.0015).abs() < 1e-12);
        assert!(out.flags.contains(QualityFlags::RESAMPLED));
    }

    #[test]
    fn test_skips_missing_bands_when_interpolating() {
        let raw = Spectrum::new(GRID.to_vec(), vec![0.002, f64::NAN, 0.004, 0.003, 0.001])
            .unwrap();
        let out = preprocess(&raw, &GRID, &options()).unwrap();

        // 443 is bridged between 412 and 490
        let expected = 0.002 + (443.0 - 412.0) / (490.0 - 412.0) * 0.002;
        assert!((out.reflectance.values()[1] - expected).abs() < 1e-12);
        assert!(out.reflectance.values().iter().all(|v| v.is_finite()));
        assert!(out.flags.contains(QualityFlags::RESAMPLED));
    }

    #[test]
    fn test_all_values_below_threshold_rejected() {
        let raw = Spectrum::new(GRID.to_vec(), vec![-0.001; 5]).unwrap();
        let result = preprocess(&raw, &GRID, &options());
        assert!(matches!(result, Err(RetrievalError::InvalidSpectrum(_))));

        let missing = Spectrum::new(GRID.to_vec(), vec![f64::NAN; 5]).unwrap();
        assert!(matches!(
            preprocess(&missing, &GRID, &options()),
            Err(RetrievalError::InvalidSpectrum(_))
        ));
    }

    #[test]
    fn test_too_few_valid_bands_rejected() {
        let raw = Spectrum::new(GRID.to_vec(), vec![0.002, 0.003, f64::NAN, f64::NAN, 0.001])
            .unwrap();
        let strict = PreprocessOptions {
            min_valid_bands: 4,
            ..options()
        };
        assert!(preprocess(&raw, &GRID, &strict).is_err());
        assert!(preprocess(&raw, &GRID, &options()).is_ok());
    }

    #[test]
    fn test_grid_outside_coverage_rejected() {
        let raw = Spectrum::new(GRID.to_vec(), vec![0.002, 0.003, 0.004, 0.003, f64::NAN])
            .unwrap();
        // 670 nm would need extrapolation beyond 555 nm
        let err = preprocess(&raw, &GRID, &options()).unwrap_err();
        assert!(err.to_string().contains("670"), "{err}");
    }

    #[test]
    fn test_uncertainty_resampled_alongside() {
        let raw = Spectrum::new(vec![400.0, 500.0, 600.0], vec![0.002, 0.004, 0.002])
            .unwrap()
            .with_uncertainty(vec![0.0002, 0.0004, 0.0002])
            .unwrap();
        let out = preprocess(&raw, &[450.0, 550.0], &options()).unwrap();

        let unc = out.reflectance.uncertainty().unwrap();
        assert!((unc[0] - 0.0003).abs() < 1e-12);
        assert!((unc[1] - 0.0003).abs() < 1e-12);
    }
}
