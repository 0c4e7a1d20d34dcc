use nalgebra::DMatrix;
use serde::Deserialize;

use crate::error::RetrievalError;
use crate::spectrum::Spectrum;

/// One fixed-shape absorption band. Centre and width are calibration
/// constants; only the amplitude is fitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GaussianBand {
    /// Peak wavelength [nm]
    pub center: f64,
    /// Standard deviation [nm]
    pub width: f64,
    pub pigment_label: String,
}

impl GaussianBand {
    pub fn new(center: f64, width: f64, pigment_label: impl Into<String>) -> Self {
        Self {
            center,
            width,
            pigment_label: pigment_label.into(),
        }
    }

    /// Unit-peak Gaussian at `wavelength`.
    #[inline]
    pub fn evaluate(&self, wavelength: f64) -> f64 {
        let z = (wavelength - self.center) / self.width;
        (-0.5 * z * z).exp()
    }
}

/// Extra non-negative column for absorption not explained by the bands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    #[default]
    None,
    Constant,
    /// exp(-slope (λ - reference)), the CDOM + detritus shape
    Exponential { slope: f64, reference: f64 },
}

impl Baseline {
    pub fn evaluate(&self, wavelength: f64) -> Option<f64> {
        match self {
            Baseline::None => None,
            Baseline::Constant => Some(1.0),
            Baseline::Exponential { slope, reference } => {
                Some((-slope * (wavelength - reference)).exp())
            }
        }
    }
}

/// The ordered band bank plus baseline. Read-only for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisSet {
    bands: Vec<GaussianBand>,
    baseline: Baseline,
}

impl BasisSet {
    pub fn new(bands: Vec<GaussianBand>, baseline: Baseline) -> Result<Self, String> {
        if bands.is_empty() {
            return Err("basis set must contain at least one band".to_string());
        }
        for band in &bands {
            if !band.center.is_finite() || !(band.width.is_finite() && band.width > 0.0) {
                return Err(format!(
                    "band '{}' at {} nm needs a finite centre and a positive width",
                    band.pigment_label, band.center
                ));
            }
        }
        if let Baseline::Exponential { slope, reference } = baseline
            && !(slope.is_finite() && reference.is_finite())
        {
            return Err("exponential baseline needs finite slope and reference".to_string());
        }

        Ok(Self { bands, baseline })
    }

    pub fn bands(&self) -> &[GaussianBand] {
        &self.bands
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Positions of the bands carrying `label`.
    pub fn indices_for(&self, label: &str) -> Vec<usize> {
        self.bands
            .iter()
            .enumerate()
            .filter(|(_, band)| band.pigment_label == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// Column i is band i evaluated on `wavelengths`; the baseline, if any, is
    /// the last column.
    pub fn design_matrix(&self, wavelengths: &[f64]) -> DesignMatrix {
        let has_baseline = self.baseline != Baseline::None;
        let ncols = self.bands.len() + usize::from(has_baseline);

        let matrix = DMatrix::from_fn(wavelengths.len(), ncols, |row, col| {
            let wl = wavelengths[row];
            match self.bands.get(col) {
                Some(band) => band.evaluate(wl),
                None => self.baseline.evaluate(wl).unwrap_or(0.0),
            }
        });

        DesignMatrix {
            wavelengths: wavelengths.to_vec(),
            matrix,
            n_bands: self.bands.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    wavelengths: Vec<f64>,
    matrix: DMatrix<f64>,
    n_bands: usize,
}

impl DesignMatrix {
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    pub fn has_baseline(&self) -> bool {
        self.matrix.ncols() > self.n_bands
    }

    /// Modelled absorption for the given amplitudes (and baseline amplitude).
    pub fn evaluate(
        &self,
        amplitudes: &[f64],
        baseline: Option<f64>,
    ) -> Result<Spectrum, RetrievalError> {
        if amplitudes.len() != self.n_bands {
            return Err(RetrievalError::Fit(format!(
                "{} amplitudes for {} bands",
                amplitudes.len(),
                self.n_bands
            )));
        }
        if baseline.is_some() != self.has_baseline() {
            return Err(RetrievalError::Fit(
                "baseline amplitude does not match the design matrix".to_string(),
            ));
        }

        let coefficients: Vec<f64> = amplitudes.iter().copied().chain(baseline).collect();
        let values = (0..self.matrix.nrows())
            .map(|row| {
                self.matrix
                    .row(row)
                    .iter()
                    .zip(&coefficients)
                    .map(|(d, c)| d * c)
                    .sum()
            })
            .collect();

        Spectrum::new(self.wavelengths.clone(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(baseline: Baseline) -> BasisSet {
        BasisSet::new(
            vec![
                GaussianBand::new(440.0, 20.0, "chla"),
                GaussianBand::new(500.0, 16.0, "ppc"),
                GaussianBand::new(675.0, 10.0, "chla"),
            ],
            baseline,
        )
        .unwrap()
    }

    #[test]
    fn test_band_shape() {
        let band = GaussianBand::new(440.0, 20.0, "chla");
        assert_eq!(band.evaluate(440.0), 1.0);
        assert!((band.evaluate(460.0) - (-0.5_f64).exp()).abs() < 1e-15);
        assert_eq!(band.evaluate(420.0), band.evaluate(460.0));
    }

    #[test]
    fn test_design_matrix_columns() {
        let design = basis(Baseline::None).design_matrix(&[440.0, 500.0, 675.0]);
        assert_eq!(design.matrix().shape(), (3, 3));
        assert!(!design.has_baseline());
        assert_eq!(design.matrix()[(0, 0)], 1.0);
        assert_eq!(design.matrix()[(1, 1)], 1.0);
        assert_eq!(design.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_baseline_column() {
        let baseline = Baseline::Exponential {
            slope: 0.015,
            reference: 443.0,
        };
        let design = basis(baseline).design_matrix(&[443.0, 500.0]);
        assert_eq!(design.matrix().shape(), (2, 4));
        assert!(design.has_baseline());
        assert_eq!(design.matrix()[(0, 3)], 1.0);
        assert!((design.matrix()[(1, 3)] - (-0.015_f64 * 57.0).exp()).abs() < 1e-15);
    }

    #[test]
    fn test_evaluate_reconstructs() {
        let design = basis(Baseline::Constant).design_matrix(&[440.0, 500.0, 675.0]);
        let spectrum = design.evaluate(&[0.1, 0.0, 0.05], Some(0.01)).unwrap();

        let expected = 0.1 * 1.0 + 0.05 * GaussianBand::new(675.0, 10.0, "").evaluate(440.0) + 0.01;
        assert!((spectrum.values()[0] - expected).abs() < 1e-15);
        assert_eq!(spectrum.wavelengths(), design.wavelengths());

        assert!(design.evaluate(&[0.1, 0.0], Some(0.01)).is_err());
        assert!(design.evaluate(&[0.1, 0.0, 0.05], None).is_err());
    }

    #[test]
    fn test_indices_for_label() {
        let basis = basis(Baseline::None);
        assert_eq!(basis.indices_for("chla"), vec![0, 2]);
        assert_eq!(basis.indices_for("ppc"), vec![1]);
        assert!(basis.indices_for("chlb").is_empty());
    }

    #[test]
    fn test_rejects_bad_bands() {
        assert!(BasisSet::new(vec![], Baseline::None).is_err());
        assert!(BasisSet::new(vec![GaussianBand::new(440.0, 0.0, "chla")], Baseline::None).is_err());
        assert!(
            BasisSet::new(
                vec![GaussianBand::new(f64::NAN, 10.0, "chla")],
                Baseline::None
            )
            .is_err()
        );
    }

    #[test]
    fn test_baseline_deserializes() {
        let none: Baseline = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(none, Baseline::None);

        let exp: Baseline =
            serde_json::from_str(r#"{"exponential": {"slope": 0.015, "reference": 443.0}}"#)
                .unwrap();
        assert_eq!(
            exp,
            Baseline::Exponential {
                slope: 0.015,
                reference: 443.0
            }
        );
    }
}
