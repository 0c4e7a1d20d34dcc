//! Spectral values on a wavelength axis.

use crate::error::RetrievalError;

/// An immutable spectrum: strictly increasing wavelengths (nm) and one value
/// per wavelength. Missing values are stored as NaN.
///
/// The same type carries raw reflectance, resampled reflectance and derived
/// absorption; each pipeline stage builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
    uncertainty: Option<Vec<f64>>,
}

impl Spectrum {
    pub fn new(wavelengths: Vec<f64>, values: Vec<f64>) -> Result<Self, RetrievalError> {
        if wavelengths.len() != values.len() {
            return Err(RetrievalError::invalid(format!(
                "{} wavelengths but {} values",
                wavelengths.len(),
                values.len()
            )));
        }
        if wavelengths.iter().any(|wl| !wl.is_finite()) {
            return Err(RetrievalError::invalid("non-finite wavelength"));
        }
        if !is_strictly_increasing(&wavelengths) {
            return Err(RetrievalError::invalid(
                "wavelengths must be strictly increasing",
            ));
        }

        Ok(Self {
            wavelengths,
            values,
            uncertainty: None,
        })
    }

    /// Attaches a per-band uncertainty (same units as the values).
    pub fn with_uncertainty(mut self, uncertainty: Vec<f64>) -> Result<Self, RetrievalError> {
        if uncertainty.len() != self.values.len() {
            return Err(RetrievalError::invalid(format!(
                "{} uncertainties for {} values",
                uncertainty.len(),
                self.values.len()
            )));
        }
        self.uncertainty = Some(uncertainty);
        Ok(self)
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn uncertainty(&self) -> Option<&[f64]> {
        self.uncertainty.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelengths
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Value at an exact grid wavelength, if present.
    pub fn value_at(&self, wavelength: f64) -> Option<f64> {
        self.wavelengths
            .iter()
            .position(|&wl| wl == wavelength)
            .map(|i| self.values[i])
    }

    /// Keeps the bands whose index is listed, in order.
    pub fn select(&self, indices: &[usize]) -> Spectrum {
        Spectrum {
            wavelengths: indices.iter().map(|&i| self.wavelengths[i]).collect(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
            uncertainty: self
                .uncertainty
                .as_ref()
                .map(|unc| indices.iter().map(|&i| unc[i]).collect()),
        }
    }
}

pub(crate) fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// Piecewise-linear interpolation of `ys` (sampled at increasing `xs`) at `x`.
///
/// Outside the sampled range the nearest end value is returned, the same way
/// band constants are looked up by closest wavelength.
pub(crate) fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }

    let upper = xs.partition_point(|&v| v < x);
    if xs[upper] == x {
        return ys[upper];
    }
    let lower = upper - 1;
    let t = (x - xs[lower]) / (xs[upper] - xs[lower]);
    ys[lower] + t * (ys[upper] - ys[lower])
}
